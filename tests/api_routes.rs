use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use telemetry_analytics::config::settings::RateLimitSettings;
use telemetry_analytics::monitoring::prometheus::ServiceMetrics;
use telemetry_analytics::monitoring::{AnalyticsConfig, AnalyticsEngine, MemorySampleStore, SampleStore};
use telemetry_analytics::{create_router, AppState};
use tower::ServiceExt;

struct Harness {
    app: Router,
    engine: AnalyticsEngine,
    store: Arc<MemorySampleStore>,
}

fn harness(ingest_per_second: u32) -> Harness {
    let engine = AnalyticsEngine::start(AnalyticsConfig::default()).unwrap();
    let store = Arc::new(MemorySampleStore::new(Duration::from_secs(300)));
    let state = AppState {
        engine: engine.clone(),
        store: store.clone(),
        metrics: Arc::new(ServiceMetrics::new().unwrap()),
    };
    let limits = RateLimitSettings {
        ingest_per_second,
        ..RateLimitSettings::default()
    };
    Harness {
        app: create_router(state, &limits),
        engine,
        store,
    }
}

fn post_sample(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/metrics")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_processed(engine: &AnalyticsEngine, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.snapshot().await.total_processed < expected {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("engine did not catch up in time");
}

#[tokio::test]
async fn ingest_fills_timestamp_and_stores_raw_sample() {
    let h = harness(0);
    let response = h
        .app
        .clone()
        .oneshot(post_sample(r#"{"device_id":"device_9","cpu":33.0,"rps":120.5}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["accepted"], true);
    let timestamp = body["metric"]["timestamp"].as_i64().unwrap();
    assert!(timestamp > 0);

    let key = format!("metric:device_9:{}", timestamp);
    let stored = h.store.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.rps, 120.5);

    wait_for_processed(&h.engine, 1).await;
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let h = harness(0);
    let response = h.app.clone().oneshot(post_sample("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
    assert_eq!(h.engine.ingest_stats().accepted, 0);
}

#[tokio::test]
async fn analyze_reports_snapshot() {
    let h = harness(0);
    for _ in 0..10 {
        let response = h
            .app
            .clone()
            .oneshot(post_sample(r#"{"device_id":"d","timestamp":5,"cpu":1.0,"rps":100.0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        wait_for_processed(&h.engine, h.engine.ingest_stats().accepted).await;
    }

    let body = json_body(h.app.clone().oneshot(get("/analyze")).await.unwrap()).await;
    assert_eq!(body["total_processed"], 10);
    assert_eq!(body["rolling_average"], 100.0);
    assert_eq!(body["mean"], 100.0);
    assert_eq!(body["std_dev"], 0.0);
    assert_eq!(body["anomaly_count"], 0);
    assert_eq!(body["anomaly_rate"], 0.0);
    assert_eq!(body["window_size"], 50);
}

#[tokio::test]
async fn health_and_prometheus_endpoints() {
    let h = harness(0);

    let response = h.app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    h.app
        .clone()
        .oneshot(post_sample(r#"{"device_id":"d","cpu":1.0,"rps":42.0}"#))
        .await
        .unwrap();
    wait_for_processed(&h.engine, 1).await;

    let response = h.app.clone().oneshot(get("/prometheus")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_requests_total 1"));
    assert!(text.contains("samples_processed_total 1"));
    assert!(text.contains("current_rps 42"));
}

#[tokio::test]
async fn ingest_is_rate_limited() {
    let h = harness(2);
    let mut statuses = vec![];
    for _ in 0..4 {
        let response = h
            .app
            .clone()
            .oneshot(post_sample(r#"{"device_id":"d","cpu":1.0,"rps":1.0}"#))
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(&statuses[..2], &[StatusCode::OK, StatusCode::OK]);
    assert!(statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));

    // reads are never throttled
    let response = h.app.clone().oneshot(get("/analyze")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let h = harness(0);
    let response = h.app.clone().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
