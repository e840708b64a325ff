//! Domain models for the campus market core.
//!
//! Listings and their moderation decisions, borrower requests, and the
//! wallet ledger that funds listings.

pub mod listing;
pub mod request;
pub mod wallet;

// Re-export all models for convenient access
pub use listing::{
    ApprovalDecision, Listing, ListingKind, ListingPayload, ListingStatus, Mrp, NewListing, Verdict,
};
pub use request::{Request, RequestStatus};
pub use wallet::{LedgerEntry, LedgerRejection, LedgerSnapshot, TransactionKind, WalletTransaction};
