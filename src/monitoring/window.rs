use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::monitoring::anomaly_detection::{Verdict, ZScoreDetector};
use crate::monitoring::sample::Sample;
use crate::monitoring::stats;
use crate::AsyncRwLock;

/// Minimum occupancy before mean, std dev and anomaly scoring kick in.
pub const WARMUP_THRESHOLD: usize = 10;

/// Summary values derived from the window contents.
///
/// Every field is written under the window's write lock in one go, so a
/// copy taken under the read lock always belongs to a single mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateState {
    pub rolling_average: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub anomaly_count: u64,
    pub total_processed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub verdict: Option<Verdict>,
    pub evicted: Option<Sample>,
}

impl RecordOutcome {
    pub fn is_anomalous(&self) -> bool {
        self.verdict.map_or(false, |v| v.is_anomalous())
    }
}

/// Fixed-capacity FIFO of recent samples plus the aggregate computed over it.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    samples: VecDeque<Sample>,
    detector: ZScoreDetector,
    state: AggregateState,
}

impl SlidingWindow {
    pub fn new(capacity: usize, detector: ZScoreDetector) -> AnalyticsResult<Self> {
        if capacity == 0 {
            return Err(AnalyticsError::invalid_config(
                "window_capacity",
                "must be greater than zero",
            ));
        }
        Ok(Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            detector,
            state: AggregateState::default(),
        })
    }

    /// Applies one sample and recomputes the aggregate.
    ///
    /// Statistics are taken over the window *after* the sample is appended,
    /// so the reading contributes to the mean and spread it is scored against.
    pub fn record(&mut self, sample: Sample) -> RecordOutcome {
        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        let rps = sample.rps;
        self.samples.push_back(sample);
        self.state.total_processed += 1;

        let values: Vec<f64> = self.samples.iter().map(|s| s.rps).collect();
        // never empty here, we just pushed
        let mean = stats::mean(&values).unwrap_or(0.0);
        self.state.rolling_average = mean;

        let mut verdict = None;
        if values.len() >= WARMUP_THRESHOLD {
            let std_dev = stats::population_std_dev(&values, mean);
            self.state.mean = mean;
            self.state.std_dev = std_dev;

            let v = self.detector.evaluate(rps, mean, std_dev);
            if let Verdict::Anomalous { z } = v {
                self.state.anomaly_count += 1;
                debug!(rps, z_score = z, mean, std_dev, "Anomalous sample detected");
            }
            verdict = Some(v);
        }

        RecordOutcome { verdict, evicted }
    }

    pub fn aggregate(&self) -> AggregateState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

/// Point-in-time copy of the aggregate, as handed to reporting code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub rolling_average: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub anomaly_count: u64,
    pub total_processed: u64,
    pub window_capacity: usize,
}

impl Snapshot {
    /// Share of processed samples flagged as anomalous, in percent.
    pub fn anomaly_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.anomaly_count as f64 / self.total_processed as f64 * 100.0
    }
}

/// The one piece of shared mutable state in the engine.
#[derive(Clone)]
pub struct SharedWindow {
    inner: Arc<AsyncRwLock<SlidingWindow>>,
    capacity: usize,
}

impl SharedWindow {
    pub fn new(window: SlidingWindow) -> Self {
        let capacity = window.capacity();
        Self {
            inner: Arc::new(AsyncRwLock::new(window)),
            capacity,
        }
    }

    pub async fn record(&self, sample: Sample) -> RecordOutcome {
        let mut window = self.inner.write().await;
        window.record(sample)
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.inner.read().await.aggregate();
        Snapshot {
            rolling_average: state.rolling_average,
            mean: state.mean,
            std_dev: state.std_dev,
            anomaly_count: state.anomaly_count,
            total_processed: state.total_processed,
            window_capacity: self.capacity,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// rps values currently resident, oldest first.
    pub async fn resident_rps(&self) -> Vec<f64> {
        self.inner.read().await.samples().map(|s| s.rps).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) async fn write_guard(&self) -> tokio::sync::RwLockWriteGuard<'_, SlidingWindow> {
        self.inner.write().await
    }
}
