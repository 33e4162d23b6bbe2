use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::monitoring::sample::Sample;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
}

/// Producer side of the bounded handoff between request handlers and the
/// dispatcher. Overflow drops the sample instead of waiting.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<Sample>,
    counters: Arc<Counters>,
}

impl IngestQueue {
    pub fn bounded(capacity: usize) -> AnalyticsResult<(Self, mpsc::Receiver<Sample>)> {
        if capacity == 0 {
            return Err(AnalyticsError::invalid_config(
                "queue_capacity",
                "must be greater than zero",
            ));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok((
            Self {
                tx,
                counters: Arc::new(Counters::default()),
            },
            rx,
        ))
    }

    /// Non-blocking enqueue. Returns `false` when the sample was dropped.
    pub fn enqueue(&self, sample: Sample) -> bool {
        match self.tx.try_send(sample) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(sample)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(device_id = %sample.device_id, "Ingest queue full, sample dropped");
                false
            }
            Err(TrySendError::Closed(sample)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(device_id = %sample.device_id, "Ingest queue closed, sample dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
