use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::monitoring::sample::Sample;
use crate::AsyncMutex;

pub const DEFAULT_RETENTION_SECS: u64 = 300;

/// Short-lived storage for raw samples, keyed by `Sample::cache_key`.
#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn put(&self, sample: &Sample) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Sample>, StoreError>;

    /// Liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn len(&self) -> usize;
}

struct Entry {
    payload: String,
    stored_at: Instant,
}

/// In-process TTL store. Entries are serialized as JSON like they would be
/// in an external cache, and expired entries are swept periodically.
#[derive(Clone)]
pub struct MemorySampleStore {
    entries: Arc<AsyncMutex<HashMap<String, Entry>>>,
    retention: Duration,
}

impl MemorySampleStore {
    pub fn new(retention: Duration) -> Self {
        info!("Initializing sample store with {}s retention", retention.as_secs());
        Self {
            entries: Arc::new(AsyncMutex::new(HashMap::new())),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Drops everything older than the retention period as of `now`.
    /// Returns how many entries were removed.
    pub async fn purge_expired(&self, now: Instant) -> usize {
        let retention = self.retention;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < retention);
        before - entries.len()
    }

    pub fn spawn_sweeper(
        &self,
        every: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired(Instant::now()).await;
                        if removed > 0 {
                            debug!(removed, "Expired samples swept");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("Sample store sweeper stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn put(&self, sample: &Sample) -> Result<(), StoreError> {
        let key = sample.cache_key();
        let payload = serde_json::to_string(sample).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.entries.lock().await.insert(
            key,
            Entry {
                payload,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Sample>, StoreError> {
        let entries = self.entries.lock().await;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if entry.stored_at.elapsed() >= self.retention {
            return Ok(None);
        }
        serde_json::from_str(&entry.payload)
            .map(Some)
            .map_err(|e| StoreError::Unavailable {
                message: format!("corrupt entry {}: {}", key, e),
            })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
