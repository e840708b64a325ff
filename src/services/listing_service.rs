use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{
    ApprovalDecision, LedgerEntry, Listing, ListingPayload, ListingStatus, Verdict,
};
use crate::notifications::{MarketEvent, NotificationDispatcher};
use crate::pricing::CostCalculator;
use crate::repositories::ListingStore;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_REASON_LEN: usize = 500;

/// Listing lifecycle: creation with its advertising fee, moderation and expiry
pub struct ListingRegistry {
    store: Arc<dyn ListingStore>,
    pricing: CostCalculator,
    listing_ttl: chrono::Duration,
    notifier: NotificationDispatcher,
}

impl ListingRegistry {
    pub fn new(
        store: Arc<dyn ListingStore>,
        pricing: CostCalculator,
        listing_ttl: chrono::Duration,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            pricing,
            listing_ttl,
            notifier,
        }
    }

    pub fn pricing(&self) -> &CostCalculator {
        &self.pricing
    }

    /// Validate, price and charge a new listing, leaving it pending moderation.
    ///
    /// The fee debit and the insert share one storage transaction: when the
    /// wallet cannot cover the fee neither the debit nor the listing exists.
    pub async fn create(&self, owner_id: Uuid, payload: ListingPayload) -> AppResult<Listing> {
        let new = payload.validate()?;

        let quote = self.pricing.quote(new.kind, &new.mrp);
        if let Some(reason) = &quote.degraded {
            warn!(
                owner = %owner_id,
                kind = new.kind.as_str(),
                "Pricing fell back to fixed fee {}: {:?}",
                quote.amount,
                reason
            );
        }

        let now = chrono::Utc::now().naive_utc();
        let mut listing = Listing::draft(Uuid::new_v4(), owner_id, new, quote.amount, now);
        listing.transition(ListingStatus::Pending)?;

        let charge = LedgerEntry::debit(
            owner_id,
            listing.cost,
            format!("Listing fee: {}", listing.title),
            listing.id.to_string(),
        );
        let (listing, debit) = self.store.insert_charged(&listing, &charge).await?;

        info!(
            "Listing created: id={}, owner={}, kind={}, cost={}, balance_after={}",
            listing.id,
            owner_id,
            listing.kind.as_str(),
            listing.cost,
            debit.balance_after
        );

        self.notifier.dispatch(MarketEvent::listing_created(&listing));

        Ok(listing)
    }

    /// Record the single moderation decision for a pending listing.
    ///
    /// A listing that was already decided fails with `Conflict`; any other
    /// non-pending state fails with `InvalidTransition`.
    pub async fn decide(
        &self,
        listing_id: Uuid,
        verdict: Verdict,
        moderator_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Listing> {
        let (listing, _) = self
            .record_verdict(listing_id, verdict, moderator_id, reason)
            .await?;
        Ok(listing)
    }

    /// `decide`, also returning the stored decision record
    pub(crate) async fn record_verdict(
        &self,
        listing_id: Uuid,
        verdict: Verdict,
        moderator_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<(Listing, ApprovalDecision)> {
        let reason = normalize_reason(reason)?;
        let mut listing = self.get(listing_id).await?;

        if listing.status != ListingStatus::Pending {
            if self.store.find_decision(listing_id).await?.is_some() {
                warn!("Listing {} already decided ({})", listing_id, listing.status);
                return Err(AppError::Conflict(format!(
                    "listing {} was already decided",
                    listing_id
                )));
            }
            let err = AppError::listing_transition(listing.status, verdict.target_status());
            warn!("Rejected decision on listing {}: {}", listing_id, err);
            return Err(err);
        }

        let decided_at = chrono::Utc::now().naive_utc();
        listing.apply_verdict(verdict, decided_at, self.listing_ttl)?;

        let decision = ApprovalDecision {
            listing_id,
            moderator_id,
            decision: verdict,
            reason,
            decided_at,
        };

        let listing = self
            .store
            .record_decision(&listing, &decision)
            .await
            .map_err(|e| match e {
                RepositoryError::StaleState(_) | RepositoryError::Duplicate(_) => {
                    warn!("Lost decision race on listing {}", listing_id);
                    AppError::Conflict(format!("listing {} was decided concurrently", listing_id))
                }
                other => other.into(),
            })?;

        info!(
            "Listing decided: id={}, decision={}, moderator={}",
            listing_id,
            verdict.as_str(),
            moderator_id
        );

        Ok((listing, decision))
    }

    pub async fn get(&self, listing_id: Uuid) -> AppResult<Listing> {
        self.store
            .find_by_id(listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", listing_id)))
    }

    /// The recorded decision; reading it never changes anything
    pub async fn decision(&self, listing_id: Uuid) -> AppResult<Option<ApprovalDecision>> {
        Ok(self.store.find_decision(listing_id).await?)
    }

    /// Pending listings, oldest first
    pub async fn pending(&self, limit: i64) -> AppResult<Vec<Listing>> {
        Ok(self.store.find_pending(limit).await?)
    }

    pub async fn listings_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<Listing>> {
        Ok(self.store.find_by_owner(owner_id).await?)
    }

    /// Move every approved listing whose lifetime ended by `now` to expired
    pub async fn expire_due(&self, now: NaiveDateTime) -> AppResult<Vec<Listing>> {
        let expired = self.store.expire_due(now).await?;
        if !expired.is_empty() {
            info!("Expired {} listings", expired.len());
        }
        Ok(expired)
    }
}

fn normalize_reason(reason: Option<String>) -> AppResult<Option<String>> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    if let Some(r) = &reason {
        if r.chars().count() > MAX_REASON_LEN {
            return Err(AppError::Validation(format!(
                "Reason must be at most {} characters",
                MAX_REASON_LEN
            )));
        }
    }

    Ok(reason)
}
