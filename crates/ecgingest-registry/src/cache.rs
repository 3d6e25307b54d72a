use crate::error::RegistryError;
use crate::source::RegistrySource;
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An immutable deviceId → userId mapping as of one successful refresh
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: HashMap<String, String>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    pub fn new(entries: HashMap<String, String>, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            entries,
            refreshed_at: Some(refreshed_at),
        }
    }

    pub fn user_for(&self, device_id: &str) -> Option<&str> {
        self.entries.get(device_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` until the first successful refresh.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

/// In-memory device registry shared by the request path and the scheduler.
///
/// The current snapshot sits behind a lock that is only ever held long enough
/// to clone or replace an `Arc`; fetching happens outside of it. Concurrent
/// refreshes each install a complete snapshot and the last one to finish wins.
pub struct DeviceRegistryCache {
    source: Arc<dyn RegistrySource>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl DeviceRegistryCache {
    /// Create an empty cache. Nothing resolves until the first refresh.
    pub fn new(source: Arc<dyn RegistrySource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    fn lookup(&self, device_id: &str) -> Option<String> {
        self.snapshot().user_for(device_id).map(str::to_owned)
    }

    /// Resolve a device to its owning user.
    ///
    /// A miss forces one refresh and a second lookup before giving up, so
    /// devices registered since the last scheduled refresh are picked up.
    pub async fn resolve(&self, device_id: &str) -> Option<String> {
        if let Some(user_id) = self.lookup(device_id) {
            return Some(user_id);
        }

        debug!(device_id, "Device not in registry snapshot, refreshing");
        if let Err(e) = self.refresh().await {
            warn!(device_id, error = %e, "On-demand registry refresh failed");
        }

        self.lookup(device_id)
    }

    /// Fetch the full registry and swap it in. Returns the new entry count.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, RegistryError> {
        let entries = match self.source.fetch_all().await {
            Ok(entries) => entries,
            Err(e) => {
                counter!("ecg.registry.refreshes", 1, "result" => "error");
                return Err(e);
            }
        };

        let snapshot = Arc::new(RegistrySnapshot::new(entries, Utc::now()));
        let count = snapshot.len();
        *self.snapshot.write() = snapshot;

        counter!("ecg.registry.refreshes", 1, "result" => "ok");
        info!("Device registry refreshed with {} entries", count);
        Ok(count)
    }
}
