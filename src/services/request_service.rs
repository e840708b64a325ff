use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{Request, RequestStatus};
use crate::notifications::{MarketEvent, NotificationDispatcher};
use crate::repositories::RequestStore;
use crate::services::ListingRegistry;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_MESSAGE_LEN: usize = 1000;

/// Borrower requests for approved listings and the lender's answer to them
pub struct RequestBroker {
    requests: Arc<dyn RequestStore>,
    listings: Arc<ListingRegistry>,
    notifier: NotificationDispatcher,
}

impl RequestBroker {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        listings: Arc<ListingRegistry>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            requests,
            listings,
            notifier,
        }
    }

    /// Pending or approved request for the pair, if any
    pub async fn find_active(&self, borrower_id: Uuid, item_id: Uuid) -> AppResult<Option<Request>> {
        Ok(self.requests.find_active(borrower_id, item_id).await?)
    }

    /// Ask the owner of an approved listing for it.
    ///
    /// Duplicate suppression is enforced by the store on insert, so
    /// concurrent identical calls yield one request and `DuplicateRequest`
    /// for every other caller.
    pub async fn create(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
        message: Option<String>,
    ) -> AppResult<Request> {
        let message = normalize_message(message)?;
        let listing = self.listings.get(item_id).await?;

        if listing.owner_id == borrower_id {
            return Err(AppError::Validation(
                "You cannot request your own listing".into(),
            ));
        }
        if !listing.is_available() {
            return Err(AppError::NotAvailable(format!(
                "Listing {} is {}",
                item_id, listing.status
            )));
        }

        let request = Request::new(item_id, borrower_id, listing.owner_id, message);
        let request = self
            .requests
            .insert(&request)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => AppError::DuplicateRequest { item_id },
                other => other.into(),
            })?;

        info!(
            "Request created: id={}, item={}, borrower={}, lender={}",
            request.id, item_id, borrower_id, request.lender_id
        );

        self.notifier.dispatch(MarketEvent::request_created(&request));

        Ok(request)
    }

    /// Lender approves or declines a request.
    ///
    /// Only the first call changes anything. Retries and racing losers get
    /// the already-decided record back unchanged and emit nothing.
    pub async fn update_status(
        &self,
        request_id: Uuid,
        status: RequestStatus,
        lender_id: Uuid,
    ) -> AppResult<Request> {
        let current = self.get(request_id).await?;

        if current.lender_id != lender_id {
            warn!(
                "User {} tried to decide request {} owned by {}",
                lender_id, request_id, current.lender_id
            );
            return Err(AppError::Unauthorized(
                "Only the lender can decide this request".into(),
            ));
        }

        if !status.is_terminal() {
            let err = AppError::request_transition(current.approval_status, status);
            warn!("Rejected update on request {}: {}", request_id, err);
            return Err(err);
        }

        if current.is_decided() {
            return Ok(current);
        }

        let decided_at = chrono::Utc::now().naive_utc();
        match self
            .requests
            .compare_and_set_status(request_id, RequestStatus::Pending, status, decided_at)
            .await?
        {
            Some(updated) => {
                info!(
                    "Request decided: id={}, status={}",
                    request_id,
                    updated.approval_status.as_str()
                );
                self.notifier.dispatch(MarketEvent::request_decided(&updated));
                Ok(updated)
            }
            // Another call decided it first
            None => self.get(request_id).await,
        }
    }

    /// Requests addressed to a lender, newest first
    pub async fn incoming(&self, lender_id: Uuid) -> AppResult<Vec<Request>> {
        Ok(self.requests.find_by_lender(lender_id).await?)
    }

    /// Requests made by a borrower, newest first
    pub async fn outgoing(&self, borrower_id: Uuid) -> AppResult<Vec<Request>> {
        Ok(self.requests.find_by_borrower(borrower_id).await?)
    }

    async fn get(&self, request_id: Uuid) -> AppResult<Request> {
        self.requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request_id)))
    }
}

fn normalize_message(message: Option<String>) -> AppResult<Option<String>> {
    let message = message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    if let Some(m) = &message {
        if m.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }
    }

    Ok(message)
}
