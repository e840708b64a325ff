//! In-process store implementing every store trait behind one mutex.
//!
//! The mutex is only taken inside synchronous closures, so it is never held
//! across an `.await`. Holding it for the whole operation gives each call the
//! same atomicity the PostgreSQL transactions provide.

use super::{LedgerStore, ListingStore, RequestStore};
use crate::error::RepositoryError;
use crate::models::{
    ApprovalDecision, LedgerEntry, LedgerSnapshot, Listing, ListingStatus, Request, RequestStatus,
    WalletTransaction,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    balances: HashMap<Uuid, i64>,
    /// Append-only, in application order
    ledger: Vec<WalletTransaction>,
    listings: HashMap<Uuid, Listing>,
    decisions: HashMap<Uuid, ApprovalDecision>,
    requests: HashMap<Uuid, Request>,
}

impl MemoryState {
    fn append(&mut self, entry: &LedgerEntry) -> Result<WalletTransaction, RepositoryError> {
        entry
            .validate()
            .map_err(RepositoryError::ConstraintViolation)?;

        if let Some(existing) = self.ledger.iter().find(|tx| entry.matches(tx)) {
            return Ok(existing.clone());
        }

        let balance = self.balances.get(&entry.account_id).copied().unwrap_or(0);
        let balance_after = entry.apply_to(balance).map_err(|rejection| {
            RepositoryError::ledger_rejected(rejection, balance, entry.amount)
        })?;

        let recorded = WalletTransaction {
            id: Uuid::new_v4(),
            account_id: entry.account_id,
            kind: entry.kind,
            amount: entry.amount,
            balance_after,
            description: entry.description.clone(),
            correlation_id: entry.correlation_id.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        };

        self.balances.insert(entry.account_id, balance_after);
        self.ledger.push(recorded.clone());

        Ok(recorded)
    }

    fn account_log(&self, account_id: Uuid) -> Vec<WalletTransaction> {
        self.ledger
            .iter()
            .filter(|tx| tx.account_id == account_id)
            .cloned()
            .collect()
    }
}

/// Store used by tests and local runs without PostgreSQL
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Number of ledger entries across all accounts
    pub fn ledger_len(&self) -> usize {
        self.with_state(|state| state.ledger.len())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn balance(&self, account_id: Uuid) -> Result<i64, RepositoryError> {
        Ok(self.with_state(|state| state.balances.get(&account_id).copied().unwrap_or(0)))
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<WalletTransaction, RepositoryError> {
        self.with_state(|state| state.append(entry))
    }

    async fn transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self.with_state(|state| {
            let mut log = state.account_log(account_id);
            log.reverse();
            log.truncate(limit);
            log
        }))
    }

    async fn snapshot(&self, account_id: Uuid) -> Result<LedgerSnapshot, RepositoryError> {
        Ok(self.with_state(|state| {
            let cached = state.balances.get(&account_id).copied().unwrap_or(0);
            LedgerSnapshot::from_log(account_id, cached, &state.account_log(account_id))
        }))
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn insert_charged(
        &self,
        listing: &Listing,
        charge: &LedgerEntry,
    ) -> Result<(Listing, WalletTransaction), RepositoryError> {
        self.with_state(|state| {
            if state.listings.contains_key(&listing.id) {
                return Err(RepositoryError::Duplicate(format!("listing {}", listing.id)));
            }
            let debit = state.append(charge)?;
            state.listings.insert(listing.id, listing.clone());
            Ok((listing.clone(), debit))
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError> {
        Ok(self.with_state(|state| state.listings.get(&id).cloned()))
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Listing>, RepositoryError> {
        Ok(self.with_state(|state| {
            let mut listings: Vec<Listing> = state
                .listings
                .values()
                .filter(|l| l.owner_id == owner_id)
                .cloned()
                .collect();
            listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            listings
        }))
    }

    async fn find_pending(&self, limit: i64) -> Result<Vec<Listing>, RepositoryError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self.with_state(|state| {
            let mut pending: Vec<Listing> = state
                .listings
                .values()
                .filter(|l| l.status == ListingStatus::Pending)
                .cloned()
                .collect();
            pending.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            pending.truncate(limit);
            pending
        }))
    }

    async fn record_decision(
        &self,
        decided: &Listing,
        decision: &ApprovalDecision,
    ) -> Result<Listing, RepositoryError> {
        self.with_state(|state| {
            let stored = state
                .listings
                .get_mut(&decided.id)
                .ok_or_else(|| RepositoryError::NotFound(format!("listing {}", decided.id)))?;

            if stored.status != ListingStatus::Pending {
                return Err(RepositoryError::StaleState(format!(
                    "listing {} is no longer pending",
                    decided.id
                )));
            }
            if state.decisions.contains_key(&decision.listing_id) {
                return Err(RepositoryError::Duplicate(format!(
                    "decision for listing {}",
                    decision.listing_id
                )));
            }

            stored.status = decided.status;
            stored.decided_at = decided.decided_at;
            stored.expires_at = decided.expires_at;
            let updated = stored.clone();
            state.decisions.insert(decision.listing_id, decision.clone());

            Ok(updated)
        })
    }

    async fn find_decision(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<ApprovalDecision>, RepositoryError> {
        Ok(self.with_state(|state| state.decisions.get(&listing_id).cloned()))
    }

    async fn expire_due(&self, now: NaiveDateTime) -> Result<Vec<Listing>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .listings
                .values_mut()
                .filter(|l| l.is_due_for_expiry(now))
                .map(|l| {
                    l.status = ListingStatus::Expired;
                    l.clone()
                })
                .collect()
        }))
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn find_active(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<Request>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .requests
                .values()
                .find(|r| r.borrower_id == borrower_id && r.item_id == item_id && r.is_active())
                .cloned()
        }))
    }

    async fn insert(&self, request: &Request) -> Result<Request, RepositoryError> {
        self.with_state(|state| {
            let taken = state.requests.values().any(|r| {
                r.borrower_id == request.borrower_id && r.item_id == request.item_id && r.is_active()
            });
            if taken || state.requests.contains_key(&request.id) {
                return Err(RepositoryError::Duplicate(format!(
                    "active request for item {} by {}",
                    request.item_id, request.borrower_id
                )));
            }
            state.requests.insert(request.id, request.clone());
            Ok(request.clone())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Request>, RepositoryError> {
        Ok(self.with_state(|state| state.requests.get(&id).cloned()))
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        decided_at: NaiveDateTime,
    ) -> Result<Option<Request>, RepositoryError> {
        Ok(self.with_state(|state| match state.requests.get_mut(&id) {
            Some(request) if request.approval_status == from => {
                request.approval_status = to;
                request.decided_at = Some(decided_at);
                Some(request.clone())
            }
            _ => None,
        }))
    }

    async fn find_by_lender(&self, lender_id: Uuid) -> Result<Vec<Request>, RepositoryError> {
        Ok(self.with_state(|state| {
            let mut requests: Vec<Request> = state
                .requests
                .values()
                .filter(|r| r.lender_id == lender_id)
                .cloned()
                .collect();
            requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            requests
        }))
    }

    async fn find_by_borrower(&self, borrower_id: Uuid) -> Result<Vec<Request>, RepositoryError> {
        Ok(self.with_state(|state| {
            let mut requests: Vec<Request> = state
                .requests
                .values()
                .filter(|r| r.borrower_id == borrower_id)
                .cloned()
                .collect();
            requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            requests
        }))
    }
}
