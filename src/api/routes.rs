/*
* Telemetry Analytics HTTP surface
* --------------------------------
*
* Thin plumbing around the analytics engine. Handlers decode samples, keep a
* short-lived raw copy in the sample store, hand them to the engine and read
* snapshots back out. None of them ever touch the window directly.
*
* Endpoints:
* ---------
* POST /metrics    - ingest one sample (throttled, body size capped)
* GET  /analyze    - current aggregate as JSON
* GET  /health     - sample store liveness
* GET  /prometheus - text exposition for scrapers
*/

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::api::middleware::rate_limit::{rate_limit_middleware, IngestRateLimit};
use crate::config::settings::RateLimitSettings;
use crate::monitoring::engine::AnalyticsEngine;
use crate::monitoring::prometheus::ServiceMetrics;
use crate::monitoring::sample::Sample;
use crate::monitoring::store::SampleStore;
use crate::utils::unix_now;

#[derive(Clone)]
pub struct AppState {
    pub engine: AnalyticsEngine,
    pub store: Arc<dyn SampleStore>,
    pub metrics: Arc<ServiceMetrics>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub rolling_average: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub anomaly_count: u64,
    pub total_processed: u64,
    pub anomaly_rate: f64,
    pub window_size: usize,
    pub dropped: u64,
}

pub fn create_router(app_state: AppState, limits: &RateLimitSettings) -> Router {
    let ingest_limit = IngestRateLimit::per_second(limits.ingest_per_second);

    let ingest_router = Router::new()
        .route("/metrics", post(ingest_sample))
        .layer(middleware::from_fn_with_state(
            ingest_limit,
            rate_limit_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(limits.max_body_bytes));

    Router::new()
        .route("/analyze", get(analyze))
        .route("/health", get(health))
        .route("/prometheus", get(prometheus_metrics))
        .merge(ingest_router)
        .fallback(fallback_handler)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

#[axum::debug_handler]
async fn ingest_sample(
    State(state): State<AppState>,
    payload: Result<Json<Sample>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    state.metrics.requests_total.inc();
    let _timer = state.metrics.request_duration_seconds.start_timer();

    let Json(sample) = payload.map_err(|rejection| ApiError::InvalidPayload(rejection.body_text()))?;
    let sample = sample.with_default_timestamp(unix_now());

    // the raw copy is best effort, analytics still gets the sample
    if let Err(e) = state.store.put(&sample).await {
        warn!(error = %e, key = %sample.cache_key(), "Failed to store raw sample");
    }

    state.metrics.current_rps.set(sample.rps);
    let accepted = state.engine.enqueue(sample.clone());

    Ok(Json(json!({
        "status": "ok",
        "accepted": accepted,
        "metric": sample,
    })))
}

#[axum::debug_handler]
async fn analyze(State(state): State<AppState>) -> Json<AnalyzeResponse> {
    let snapshot = state.engine.snapshot().await;
    let ingest = state.engine.ingest_stats();

    Json(AnalyzeResponse {
        rolling_average: snapshot.rolling_average,
        mean: snapshot.mean,
        std_dev: snapshot.std_dev,
        anomaly_count: snapshot.anomaly_count,
        total_processed: snapshot.total_processed,
        anomaly_rate: snapshot.anomaly_rate(),
        window_size: snapshot.window_capacity,
        dropped: ingest.dropped,
    })
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.ping().await?;
    Ok(Json(json!({ "status": "healthy" })))
}

async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.engine.snapshot().await;
    state.metrics.observe(&snapshot, state.engine.ingest_stats());
    let body = state.metrics.render()?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    debug!("Fallback handler called for {} {}", req.method(), req.uri());
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
