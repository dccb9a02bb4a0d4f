use crate::domain_port::{Clock, RefreshTokenStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Periodic removal of refresh records nobody will present again. Reads
/// already judge liveness on their own; this only reclaims space.
pub struct Sweeper {
    store: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Sweeper {
            store,
            clock,
            interval,
        }
    }

    /// One pass. Failures are logged and retried on the next tick.
    pub async fn sweep_once(&self) -> u64 {
        match self.store.sweep_expired(self.clock.now()).await {
            Ok(0) => {
                debug!("sweep found nothing to remove");
                0
            }
            Ok(removed) => {
                info!(removed, "expired refresh records swept");
                removed
            }
            Err(e) => {
                error!(error = %e, "refresh record sweep failed");
                0
            }
        }
    }

    #[instrument(skip_all, name = "refresh_sweeper")]
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval = ?self.interval, "refresh sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("refresh sweeper stopped");
    }
}
