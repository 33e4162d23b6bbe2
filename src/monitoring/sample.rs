use serde::{Deserialize, Serialize};

/// One telemetry reading pushed by a device.
///
/// Samples are immutable once they reach the engine. The ingest handler is
/// responsible for filling in a missing timestamp before enqueueing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Sample {
    pub device_id: String,
    #[serde(default)]
    pub timestamp: i64,
    pub cpu: f64,
    pub rps: f64,
}

impl Sample {
    pub fn new(device_id: impl Into<String>, timestamp: i64, cpu: f64, rps: f64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            cpu,
            rps,
        }
    }

    /// Replaces a zero timestamp with `now` (unix seconds).
    pub fn with_default_timestamp(mut self, now: i64) -> Self {
        if self.timestamp == 0 {
            self.timestamp = now;
        }
        self
    }

    /// Key used by the raw sample store.
    pub fn cache_key(&self) -> String {
        format!("metric:{}:{}", self.device_id, self.timestamp)
    }
}
