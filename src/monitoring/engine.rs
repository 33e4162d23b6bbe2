/*
* Streaming analytics engine
* --------------------------
*
* Samples come in through a bounded queue, a single dispatcher task drains
* it, and each sample is applied to the shared sliding window by its own
* short-lived task. Readers grab a snapshot of the aggregate whenever they
* like. The whole thing is an explicitly constructed value: build one per
* service (or per test) and hand clones to whoever needs it.
*
*   enqueue() ──► IngestQueue ──► Dispatcher ──► task ──► SharedWindow
*                                                             │
*   snapshot() ◄───────────────────────────────────────────────┘
*
* Overflow at the queue is a silent drop (enqueue returns false). Stopping
* the engine stops dequeuing and lets already spawned tasks finish.
*/

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::monitoring::anomaly_detection::{ZScoreDetector, DEFAULT_ANOMALY_THRESHOLD};
use crate::monitoring::dispatcher::{DispatchSummary, Dispatcher, DEFAULT_MAX_IN_FLIGHT};
use crate::monitoring::queue::{IngestQueue, IngestStats, DEFAULT_QUEUE_CAPACITY};
use crate::monitoring::sample::Sample;
use crate::monitoring::window::{SharedWindow, SlidingWindow, Snapshot};
use crate::AsyncMutex;

pub const DEFAULT_WINDOW_CAPACITY: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    pub window_capacity: usize,
    pub anomaly_threshold: f64,
    pub queue_capacity: usize,
    pub max_in_flight: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.window_capacity == 0 {
            return Err(AnalyticsError::invalid_config(
                "window_capacity",
                "must be greater than zero",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(AnalyticsError::invalid_config(
                "queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.max_in_flight == 0 {
            return Err(AnalyticsError::invalid_config(
                "max_in_flight",
                "must be greater than zero",
            ));
        }
        ZScoreDetector::new(self.anomaly_threshold)?;
        Ok(())
    }
}

struct EngineInner {
    queue: IngestQueue,
    window: SharedWindow,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: AsyncMutex<Option<JoinHandle<DispatchSummary>>>,
}

/// Cheap to clone; all clones drive the same window.
#[derive(Clone)]
pub struct AnalyticsEngine {
    inner: Arc<EngineInner>,
}

impl AnalyticsEngine {
    /// Validates the configuration and spawns the dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: AnalyticsConfig) -> AnalyticsResult<Self> {
        config.validate()?;

        let detector = ZScoreDetector::new(config.anomaly_threshold)?;
        let window = SharedWindow::new(SlidingWindow::new(config.window_capacity, detector)?);
        let (queue, rx) = IngestQueue::bounded(config.queue_capacity)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(rx, window.clone(), config.max_in_flight, shutdown_rx);
        let handle = tokio::spawn(dispatcher.run());

        info!(
            window_capacity = config.window_capacity,
            anomaly_threshold = config.anomaly_threshold,
            queue_capacity = config.queue_capacity,
            max_in_flight = config.max_in_flight,
            "Analytics engine started"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                queue,
                window,
                shutdown_tx,
                dispatcher: AsyncMutex::new(Some(handle)),
            }),
        })
    }

    /// Best-effort, non-blocking handoff. `false` means the sample was lost.
    pub fn enqueue(&self, sample: Sample) -> bool {
        self.inner.queue.enqueue(sample)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.window.snapshot().await
    }

    pub fn window_capacity(&self) -> usize {
        self.inner.window.capacity()
    }

    pub fn ingest_stats(&self) -> IngestStats {
        self.inner.queue.stats()
    }

    pub fn window(&self) -> &SharedWindow {
        &self.inner.window
    }

    /// Stops dequeuing and waits for in-flight samples. Safe to call twice.
    pub async fn shutdown(&self) -> Option<DispatchSummary> {
        let _ = self.inner.shutdown_tx.send(true);

        let handle = self.inner.dispatcher.lock().await.take()?;
        match handle.await {
            Ok(summary) => {
                info!(dispatched = summary.dispatched, "Analytics engine stopped");
                Some(summary)
            }
            Err(e) => {
                error!(error = %e, "Dispatcher task ended abnormally");
                None
            }
        }
    }
}
