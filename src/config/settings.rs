/*
* Telemetry Analytics Configuration
* ---------------------------------
*
* Hierarchical configuration, lowest to highest priority:
*
* 1. Hardcoded defaults (the same values `generate_default_config` writes)
* 2. {CONFIG_PATH}/default.toml
* 3. {CONFIG_PATH}/local.toml, for machine specific overrides
* 4. Environment variables, prefixed APP_ with `__` between levels,
*    e.g. APP_ANALYTICS__WINDOW_CAPACITY=200
*
* Sections:
* --------
* server      - where the HTTP collaborator listens
* analytics   - window size, z-score threshold, queue depth, fan-out cap
* cache       - raw sample retention and sweep cadence
* rate_limits - ingest throttling and body size limit (0 disables throttling)
*
* The analytics section is validated again when the engine starts, so a bad
* value in any layer stops the service before it accepts traffic.
*/

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::monitoring::engine::AnalyticsConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub analytics: AnalyticsSettings,
    pub cache: CacheSettings,
    pub rate_limits: RateLimitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSettings {
    pub window_capacity: usize,
    pub anomaly_threshold: f64,
    pub queue_capacity: usize,
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub ingest_per_second: u32,
    pub max_body_bytes: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            ingest_per_second: 0,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn new_from_file(dir: &Path) -> Result<Self, ConfigError> {
        Self::load_from(dir)
    }

    fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from path: {}", dir.display());

        let defaults = generate_default_config();
        let config = Config::builder()
            // Start with default settings
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as u64)?
            .set_default("analytics.window_capacity", defaults.analytics.window_capacity as u64)?
            .set_default("analytics.anomaly_threshold", defaults.analytics.anomaly_threshold)?
            .set_default("analytics.queue_capacity", defaults.analytics.queue_capacity as u64)?
            .set_default("analytics.max_in_flight", defaults.analytics.max_in_flight as u64)?
            .set_default("cache.retention_secs", defaults.cache.retention_secs)?
            .set_default("cache.sweep_interval_secs", defaults.cache.sweep_interval_secs)?
            .set_default("rate_limits.ingest_per_second", defaults.rate_limits.ingest_per_second as u64)?
            .set_default("rate_limits.max_body_bytes", defaults.rate_limits.max_body_bytes as u64)?

            // Add configuration from files
            .add_source(File::with_name(&format!("{}/default", dir.display())).required(false))
            .add_source(File::with_name(&format!("{}/local", dir.display())).required(false))

            // Add environment variables with prefix "APP_"
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            window_capacity: self.analytics.window_capacity,
            anomaly_threshold: self.analytics.anomaly_threshold,
            queue_capacity: self.analytics.queue_capacity,
            max_in_flight: self.analytics.max_in_flight,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.cache.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_secs.max(1))
    }
}

pub fn generate_default_config() -> Settings {
    let analytics = AnalyticsConfig::default();
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        analytics: AnalyticsSettings {
            window_capacity: analytics.window_capacity,
            anomaly_threshold: analytics.anomaly_threshold,
            queue_capacity: analytics.queue_capacity,
            max_in_flight: analytics.max_in_flight,
        },
        cache: CacheSettings {
            retention_secs: 300,
            sweep_interval_secs: 30,
        },
        rate_limits: RateLimitSettings::default(),
    }
}
