pub mod anomaly_detection;
pub mod dispatcher;
pub mod engine;
pub mod prometheus;
pub mod queue;
pub mod sample;
pub mod stats;
pub mod store;
pub mod window;

pub use anomaly_detection::{Verdict, ZScoreDetector};
pub use engine::{AnalyticsConfig, AnalyticsEngine};
pub use queue::{IngestQueue, IngestStats};
pub use sample::Sample;
pub use store::{MemorySampleStore, SampleStore};
pub use window::{AggregateState, SharedWindow, SlidingWindow, Snapshot, WARMUP_THRESHOLD};
