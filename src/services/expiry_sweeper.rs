use crate::error::AppResult;
use crate::models::Listing;
use crate::notifications::{MarketEvent, NotificationDispatcher};
use crate::services::ListingRegistry;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

/// Background task that retires approved listings once their lifetime ends
pub struct ExpirySweeper {
    registry: Arc<ListingRegistry>,
    notifier: NotificationDispatcher,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(registry: Arc<ListingRegistry>, notifier: NotificationDispatcher) -> Self {
        Self {
            registry,
            notifier,
            interval: Duration::from_secs(300), // Default: 5 minutes
        }
    }

    /// Set sweep interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweep on every tick until the task is dropped. A failed sweep is
    /// logged and retried on the next tick.
    pub async fn start(self) {
        let mut interval = time::interval(self.interval);
        info!("Expiry sweeper started, sweeping every {:?}", self.interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.sweep(chrono::Utc::now().naive_utc()).await {
                error!("Error in expiry sweeper: {}", e);
            }
        }
    }

    /// Expire everything due at `now` and announce each expiry
    pub async fn sweep(&self, now: NaiveDateTime) -> AppResult<Vec<Listing>> {
        let expired = self.registry.expire_due(now).await?;

        for listing in &expired {
            self.notifier.dispatch(MarketEvent::listing_expired(listing));
        }

        Ok(expired)
    }
}
