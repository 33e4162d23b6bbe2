pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod monitoring;
pub mod server;
pub mod utils;

// Re-exports
pub use api::routes::{create_router, AppState};
pub use monitoring::engine::{AnalyticsConfig, AnalyticsEngine};
pub use monitoring::sample::Sample;
pub use monitoring::window::Snapshot;
pub type AsyncMutex<T> = tokio::sync::Mutex<T>;
pub type AsyncRwLock<T> = tokio::sync::RwLock<T>;
