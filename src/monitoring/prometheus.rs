//! Prometheus exposition for the ingest service.

use ::prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Mutex;

use crate::errors::AnalyticsResult;
use crate::monitoring::queue::IngestStats;
use crate::monitoring::window::Snapshot;

pub struct ServiceMetrics {
    registry: Registry,
    pub requests_total: IntCounter,
    pub request_duration_seconds: Histogram,
    pub anomalies_total: IntCounter,
    pub processed_total: IntCounter,
    pub dropped_total: IntCounter,
    pub current_rps: Gauge,
    pub rolling_average_rps: Gauge,
    pub window_mean_rps: Gauge,
    pub window_std_dev_rps: Gauge,
    // serializes the counter catch-up in `observe`
    sync: Mutex<()>,
}

impl ServiceMetrics {
    /// Create and register the service metrics on a private registry
    pub fn new() -> AnalyticsResult<Self> {
        let registry = Registry::new();

        let requests_total =
            IntCounter::new("http_requests_total", "Total number of ingest requests")?;
        let request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "Ingest request duration in seconds",
        ))?;
        let anomalies_total =
            IntCounter::new("anomalies_detected_total", "Total number of anomalies detected")?;
        let processed_total = IntCounter::new(
            "samples_processed_total",
            "Samples applied to the sliding window",
        )?;
        let dropped_total = IntCounter::new(
            "samples_dropped_total",
            "Samples dropped because the ingest queue was full",
        )?;
        let current_rps = Gauge::new("current_rps", "rps of the most recently ingested sample")?;
        let rolling_average_rps =
            Gauge::new("rolling_average_rps", "Rolling average rps over the window")?;
        let window_mean_rps = Gauge::new("window_mean_rps", "Mean rps once the window is warm")?;
        let window_std_dev_rps = Gauge::new(
            "window_std_dev_rps",
            "Population std dev of rps once the window is warm",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(anomalies_total.clone()))?;
        registry.register(Box::new(processed_total.clone()))?;
        registry.register(Box::new(dropped_total.clone()))?;
        registry.register(Box::new(current_rps.clone()))?;
        registry.register(Box::new(rolling_average_rps.clone()))?;
        registry.register(Box::new(window_mean_rps.clone()))?;
        registry.register(Box::new(window_std_dev_rps.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            anomalies_total,
            processed_total,
            dropped_total,
            current_rps,
            rolling_average_rps,
            window_mean_rps,
            window_std_dev_rps,
            sync: Mutex::new(()),
        })
    }

    /// Brings gauges and mirrored counters in line with the engine.
    ///
    /// Counters only ever move forward by the difference to what they
    /// already report.
    pub fn observe(&self, snapshot: &Snapshot, ingest: IngestStats) {
        let _guard = self.sync.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        self.rolling_average_rps.set(snapshot.rolling_average);
        self.window_mean_rps.set(snapshot.mean);
        self.window_std_dev_rps.set(snapshot.std_dev);

        catch_up(&self.anomalies_total, snapshot.anomaly_count);
        catch_up(&self.processed_total, snapshot.total_processed);
        catch_up(&self.dropped_total, ingest.dropped);
    }

    /// Text exposition format.
    pub fn render(&self) -> AnalyticsResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn catch_up(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}
