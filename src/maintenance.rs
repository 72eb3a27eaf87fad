//! Background maintenance loop.
//!
//! One task owns all periodic housekeeping: sweeping expired quota windows
//! and cache entries, and re-probing stale source health records. Runs on a
//! tokio interval with an explicit shutdown signal, so there is no polling
//! and teardown is deterministic.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregator::SourceAggregator;
use crate::cache::ResponseCache;
use crate::quota::QuotaTracker;

/// Handle to the running maintenance loop.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) aborts
/// nothing; the loop keeps running until the process exits or the shutdown
/// signal is sent.
pub struct MaintenanceTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MaintenanceTask {
    /// Spawn the maintenance loop with the given tick interval.
    pub fn spawn(
        quota: Arc<QuotaTracker>,
        cache: Arc<ResponseCache>,
        aggregator: Arc<SourceAggregator>,
        interval: Duration,
    ) -> Self {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so spawn is cheap.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("maintenance tick");
                        quota.sweep_expired();
                        cache.sweep_expired();
                        aggregator.sources_health().await;
                    }
                    result = rx.changed() => {
                        if result.is_err() || *rx.borrow() {
                            debug!("maintenance loop stopping");
                            break;
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("maintenance task ended abnormally: {}", e);
        }
    }
}
