use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("Settings Error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Store Error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics Error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl AnalyticsError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sample store is unavailable: {message}")]
    Unavailable {
        message: String,
    },

    #[error("Failed to encode sample {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

// Result type alias for convenience
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
