use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::errors::{AnalyticsError, StoreError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid JSON: {0}")]
    InvalidPayload(String),

    #[error("Store unavailable: {0}")]
    Unhealthy(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] AnalyticsError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Unhealthy(e) => json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
            other => {
                if status.is_server_error() {
                    error!(error = %other, "Request failed");
                }
                json!({ "error": other.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}
