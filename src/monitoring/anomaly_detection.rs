use serde::Serialize;

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::monitoring::stats;

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

/// Outcome of scoring one reading against the window statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Verdict {
    Normal { z: f64 },
    Anomalous { z: f64 },
    /// Zero spread, no score can be computed.
    Undecidable,
}

impl Verdict {
    pub fn is_anomalous(&self) -> bool {
        matches!(self, Verdict::Anomalous { .. })
    }

    pub fn z_score(&self) -> Option<f64> {
        match *self {
            Verdict::Normal { z } | Verdict::Anomalous { z } => Some(z),
            Verdict::Undecidable => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZScoreDetector {
    threshold: f64,
}

impl ZScoreDetector {
    pub fn new(threshold: f64) -> AnalyticsResult<Self> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AnalyticsError::invalid_config(
                "anomaly_threshold",
                format!("must be a positive finite number, got {}", threshold),
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A reading is anomalous when `|z| > threshold`, strictly.
    pub fn evaluate(&self, value: f64, mean: f64, std_dev: f64) -> Verdict {
        match stats::z_score(value, mean, std_dev) {
            Some(z) if z.abs() > self.threshold => Verdict::Anomalous { z },
            Some(z) => Verdict::Normal { z },
            None => Verdict::Undecidable,
        }
    }
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }
}
