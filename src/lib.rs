//! Campus Market Core Library
//!
//! Transaction workflow for the campus marketplace: listing creation with
//! its advertising fee, admin moderation, borrower requests and the wallet
//! ledger that funds it all.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod notifications;
pub mod pricing;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use config::MarketConfig;
use notifications::NotificationDispatcher;
use pricing::CostCalculator;
use repositories::{
    LedgerStore, ListingRepository, ListingStore, MemoryStore, RequestRepository, RequestStore,
    WalletRepository,
};
use services::{ApprovalQueue, ExpirySweeper, ListingRegistry, RequestBroker, WalletLedger};
use std::sync::Arc;

/// Application state containing all services, wired to one set of stores
pub struct AppState {
    pub wallet: Arc<WalletLedger>,
    pub listings: Arc<ListingRegistry>,
    pub approvals: Arc<ApprovalQueue>,
    pub requests: Arc<RequestBroker>,
    pub notifier: NotificationDispatcher,
    pub market: MarketConfig,
}

impl AppState {
    /// Services backed by PostgreSQL
    pub fn new(pool: sqlx::PgPool, market: &MarketConfig, notifier: NotificationDispatcher) -> Self {
        Self::from_stores(
            Arc::new(WalletRepository::new(pool.clone())),
            Arc::new(ListingRepository::new(pool.clone())),
            Arc::new(RequestRepository::new(pool)),
            market,
            notifier,
        )
    }

    /// Services backed by a fresh [`MemoryStore`]
    pub fn in_memory(market: &MarketConfig, notifier: NotificationDispatcher) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_stores(store.clone(), store.clone(), store, market, notifier)
    }

    pub fn from_stores(
        ledger: Arc<dyn LedgerStore>,
        listings: Arc<dyn ListingStore>,
        requests: Arc<dyn RequestStore>,
        market: &MarketConfig,
        notifier: NotificationDispatcher,
    ) -> Self {
        let registry = Arc::new(ListingRegistry::new(
            listings,
            CostCalculator::from_config(market),
            market.listing_ttl(),
            notifier.clone(),
        ));

        Self {
            wallet: Arc::new(WalletLedger::new(ledger)),
            approvals: Arc::new(ApprovalQueue::new(registry.clone(), notifier.clone())),
            requests: Arc::new(RequestBroker::new(requests, registry.clone(), notifier.clone())),
            listings: registry,
            notifier,
            market: market.clone(),
        }
    }

    pub fn expiry_sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.listings.clone(), self.notifier.clone())
            .with_interval(self.market.sweep_interval())
    }
}
