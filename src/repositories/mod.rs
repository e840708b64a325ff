//! Storage seams for the workflow core.
//!
//! Each store trait is the sole writer of its tables. PostgreSQL
//! implementations live next to the trait definitions; [`MemoryStore`]
//! implements all three for tests and local runs.

pub mod listing_repository;
pub mod memory;
pub mod request_repository;
pub mod wallet_repository;

pub use listing_repository::ListingRepository;
pub use memory::MemoryStore;
pub use request_repository::RequestRepository;
pub use wallet_repository::WalletRepository;

use crate::error::RepositoryError;
use crate::models::{
    ApprovalDecision, LedgerEntry, LedgerSnapshot, Listing, Request, RequestStatus,
    WalletTransaction,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

/// Append-only wallet ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Cached balance; 0 for accounts that never transacted
    async fn balance(&self, account_id: Uuid) -> Result<i64, RepositoryError>;

    /// Apply one credit or debit. Serialized per account: the balance read,
    /// the funds check and the append happen as one unit. An entry whose
    /// (account, kind, correlation id) was already recorded returns the
    /// recorded transaction unchanged.
    async fn append(&self, entry: &LedgerEntry) -> Result<WalletTransaction, RepositoryError>;

    /// Newest first
    async fn transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError>;

    /// Cached balance together with totals recomputed from the full log
    async fn snapshot(&self, account_id: Uuid) -> Result<LedgerSnapshot, RepositoryError>;
}

/// Listing lifecycle persistence
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Debit `charge` and persist `listing` as one unit; neither happens if
    /// the debit cannot be covered.
    async fn insert_charged(
        &self,
        listing: &Listing,
        charge: &LedgerEntry,
    ) -> Result<(Listing, WalletTransaction), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError>;

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Listing>, RepositoryError>;

    /// Pending listings, oldest first
    async fn find_pending(&self, limit: i64) -> Result<Vec<Listing>, RepositoryError>;

    /// Store `decided` (already moved to its verdict status) only if the
    /// stored row is still pending, together with its decision record.
    /// Fails with `StaleState` when the row moved on.
    async fn record_decision(
        &self,
        decided: &Listing,
        decision: &ApprovalDecision,
    ) -> Result<Listing, RepositoryError>;

    async fn find_decision(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<ApprovalDecision>, RepositoryError>;

    /// Move approved listings with `expires_at <= now` to expired
    async fn expire_due(&self, now: NaiveDateTime) -> Result<Vec<Listing>, RepositoryError>;
}

/// Borrower request persistence
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Pending or approved request for the pair
    async fn find_active(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<Request>, RepositoryError>;

    /// Insert a pending request. Fails with `Duplicate` when the pair
    /// already has an active request, including under concurrent inserts.
    async fn insert(&self, request: &Request) -> Result<Request, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Request>, RepositoryError>;

    /// Set `to` only if the stored status is still `from`; `None` otherwise
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        decided_at: NaiveDateTime,
    ) -> Result<Option<Request>, RepositoryError>;

    /// Requests addressed to a lender, newest first
    async fn find_by_lender(&self, lender_id: Uuid) -> Result<Vec<Request>, RepositoryError>;

    /// Requests made by a borrower, newest first
    async fn find_by_borrower(&self, borrower_id: Uuid) -> Result<Vec<Request>, RepositoryError>;
}
