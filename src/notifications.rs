//! Domain events and their fire-and-forget delivery.
//!
//! Services hand a [`MarketEvent`] to the [`NotificationDispatcher`] only
//! after the state change it describes has been committed. Delivery runs on
//! a spawned task; a failing notifier is logged and never rolls anything
//! back.

use crate::error::{AppError, AppResult};
use crate::models::{Listing, ListingKind, Request, RequestStatus, Verdict};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(2);

/// Committed state change worth telling someone about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    ListingCreated {
        listing_id: Uuid,
        owner_id: Uuid,
        kind: ListingKind,
        cost: i64,
    },
    ListingDecided {
        listing_id: Uuid,
        owner_id: Uuid,
        moderator_id: Uuid,
        decision: Verdict,
        reason: Option<String>,
    },
    ListingExpired {
        listing_id: Uuid,
        owner_id: Uuid,
    },
    RequestCreated {
        request_id: Uuid,
        item_id: Uuid,
        borrower_id: Uuid,
        lender_id: Uuid,
    },
    RequestDecided {
        request_id: Uuid,
        item_id: Uuid,
        borrower_id: Uuid,
        lender_id: Uuid,
        status: RequestStatus,
    },
}

impl MarketEvent {
    pub fn listing_created(listing: &Listing) -> Self {
        MarketEvent::ListingCreated {
            listing_id: listing.id,
            owner_id: listing.owner_id,
            kind: listing.kind,
            cost: listing.cost,
        }
    }

    pub fn listing_decided(
        listing: &Listing,
        moderator_id: Uuid,
        decision: Verdict,
        reason: Option<String>,
    ) -> Self {
        MarketEvent::ListingDecided {
            listing_id: listing.id,
            owner_id: listing.owner_id,
            moderator_id,
            decision,
            reason,
        }
    }

    pub fn listing_expired(listing: &Listing) -> Self {
        MarketEvent::ListingExpired {
            listing_id: listing.id,
            owner_id: listing.owner_id,
        }
    }

    pub fn request_created(request: &Request) -> Self {
        MarketEvent::RequestCreated {
            request_id: request.id,
            item_id: request.item_id,
            borrower_id: request.borrower_id,
            lender_id: request.lender_id,
        }
    }

    pub fn request_decided(request: &Request) -> Self {
        MarketEvent::RequestDecided {
            request_id: request.id,
            item_id: request.item_id,
            borrower_id: request.borrower_id,
            lender_id: request.lender_id,
            status: request.approval_status,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            MarketEvent::ListingCreated { .. } => "listing_created",
            MarketEvent::ListingDecided { .. } => "listing_decided",
            MarketEvent::ListingExpired { .. } => "listing_expired",
            MarketEvent::RequestCreated { .. } => "request_created",
            MarketEvent::RequestDecided { .. } => "request_decided",
        }
    }

    /// Listing or request the event is about
    pub fn subject_id(&self) -> Uuid {
        match self {
            MarketEvent::ListingCreated { listing_id, .. }
            | MarketEvent::ListingDecided { listing_id, .. }
            | MarketEvent::ListingExpired { listing_id, .. } => *listing_id,
            MarketEvent::RequestCreated { request_id, .. }
            | MarketEvent::RequestDecided { request_id, .. } => *request_id,
        }
    }

    /// User who should hear about it
    pub fn recipient_id(&self) -> Uuid {
        match self {
            MarketEvent::ListingCreated { owner_id, .. }
            | MarketEvent::ListingDecided { owner_id, .. }
            | MarketEvent::ListingExpired { owner_id, .. } => *owner_id,
            MarketEvent::RequestCreated { lender_id, .. } => *lender_id,
            MarketEvent::RequestDecided { borrower_id, .. } => *borrower_id,
        }
    }
}

/// A delivery channel for market events
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &MarketEvent) -> AppResult<()>;
}

/// Writes every event to the tracing output
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &MarketEvent) -> AppResult<()> {
        info!(
            event_type = event.event_type(),
            subject = %event.subject_id(),
            recipient = %event.recipient_id(),
            "Market event"
        );
        Ok(())
    }
}

/// POSTs each event as JSON to an external endpoint
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &MarketEvent) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::Message(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Message(format!(
                "Webhook returned {} for {}",
                response.status(),
                event.event_type()
            )));
        }

        Ok(())
    }
}

/// Fans events out to every registered notifier
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver in the background. Outside a Tokio runtime the event is dropped.
    pub fn dispatch(&self, event: MarketEvent) {
        if self.notifiers.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dispatcher = self.clone();
                handle.spawn(async move { dispatcher.deliver(&event).await });
            }
            Err(_) => warn!(
                event_type = event.event_type(),
                "No async runtime, dropping notification"
            ),
        }
    }

    /// Deliver to every notifier in turn, logging failures
    pub async fn deliver(&self, event: &MarketEvent) {
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(event).await {
                warn!(
                    notifier = notifier.name(),
                    event_type = event.event_type(),
                    subject = %event.subject_id(),
                    "Notification failed: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_tagged() {
        let event = MarketEvent::ListingExpired {
            listing_id: Uuid::nil(),
            owner_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "listing_expired");
        assert_eq!(event.event_type(), "listing_expired");
    }

    #[test]
    fn test_dispatch_without_runtime_does_not_panic() {
        let dispatcher = NotificationDispatcher::new().with_notifier(Arc::new(LogNotifier));
        dispatcher.dispatch(MarketEvent::ListingExpired {
            listing_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
        });
        assert_eq!(dispatcher.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_an_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook").unwrap();
        let event = MarketEvent::ListingExpired {
            listing_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
        };
        assert!(notifier.notify(&event).await.is_err());
    }
}
