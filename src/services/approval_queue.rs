use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::{ApprovalDecision, Listing, Verdict};
use crate::notifications::{MarketEvent, NotificationDispatcher};
use crate::services::ListingRegistry;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const MAX_PAGE_SIZE: i64 = 200;

/// Admin moderation view over pending listings
pub struct ApprovalQueue {
    registry: Arc<ListingRegistry>,
    notifier: NotificationDispatcher,
}

impl ApprovalQueue {
    pub fn new(registry: Arc<ListingRegistry>, notifier: NotificationDispatcher) -> Self {
        Self { registry, notifier }
    }

    /// Listings awaiting moderation, oldest first, at most `MAX_PAGE_SIZE` per call
    pub async fn pending(&self, limit: i64) -> AppResult<Vec<Listing>> {
        if limit <= 0 {
            return Err(AppError::Validation("Limit must be greater than zero".into()));
        }
        self.registry.pending(limit.min(MAX_PAGE_SIZE)).await
    }

    pub async fn decide(
        &self,
        caller: &Caller,
        listing_id: Uuid,
        verdict: Verdict,
        reason: Option<String>,
    ) -> AppResult<Listing> {
        if let Err(e) = caller.require_admin() {
            warn!("Non-admin {} tried to decide listing {}", caller.id, listing_id);
            return Err(e);
        }

        let (listing, decision) = self
            .registry
            .record_verdict(listing_id, verdict, caller.id, reason)
            .await?;

        self.notifier.dispatch(MarketEvent::listing_decided(
            &listing,
            decision.moderator_id,
            decision.decision,
            decision.reason,
        ));

        Ok(listing)
    }

    pub async fn decision(&self, listing_id: Uuid) -> AppResult<Option<ApprovalDecision>> {
        self.registry.decision(listing_id).await
    }
}
