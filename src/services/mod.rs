pub mod approval_queue;
pub mod audit;
pub mod expiry_sweeper;
pub mod listing_service;
pub mod request_service;
pub mod wallet_service;

pub use approval_queue::ApprovalQueue;
pub use audit::{AuditLogEntry, AuditTrailService};
pub use expiry_sweeper::ExpirySweeper;
pub use listing_service::ListingRegistry;
pub use request_service::RequestBroker;
pub use wallet_service::WalletLedger;
