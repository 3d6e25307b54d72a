use crate::cache::DeviceRegistryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Periodically forces a full registry refresh.
///
/// The first tick fires immediately so the cache is warm before traffic
/// arrives. Ticks missed during a slow refresh are delayed, not bunched.
pub struct RefreshScheduler {
    cache: Arc<DeviceRegistryCache>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<DeviceRegistryCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Registry refresh scheduler started (interval={}s)",
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Registry refresh scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    // A hung fetch must not hold up shutdown; dropping it
                    // leaves the previous snapshot in place.
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Registry refresh scheduler stopping mid-refresh");
                            break;
                        }
                        result = self.cache.refresh() => {
                            if let Err(e) = result {
                                warn!(error = %e, "Scheduled registry refresh failed, keeping last snapshot");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Spawn onto the current runtime.
    pub fn spawn(self) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        RefreshHandle { cancel, task }
    }
}

/// Handle to a spawned [`RefreshScheduler`]
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Registry refresh task ended abnormally");
        }
    }
}
