//! Common test utilities and helpers for integration tests.

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::chrono::{DateTime, Duration, Utc};
use shared::monitoring::{InMemoryMonitoringBackend, Point, TimeSeries};
use shared::storage::InMemoryRowSink;

/// Project every test collects.
pub const PROJECT: &str = "t1";

/// Handles onto the in-memory backends behind a test router.
pub struct TestBackends {
    pub monitoring: InMemoryMonitoringBackend,
    pub sink: InMemoryRowSink,
}

/// Creates a test router over the given monitoring pages and sink.
pub fn test_app(
    monitoring: InMemoryMonitoringBackend,
    sink: InMemoryRowSink,
) -> (Router, TestBackends) {
    let state = AppState::with_in_memory_backends(PROJECT, monitoring.clone(), sink.clone());
    (create_router(state), TestBackends { monitoring, sink })
}

/// Builds a bucket size series as Cloud Monitoring returns it.
pub fn bucket_series(bucket: &str, class: &str, bytes: f64, at: DateTime<Utc>) -> TimeSeries {
    TimeSeries::default()
        .with_resource_label("project_id", PROJECT)
        .with_resource_label("bucket_name", bucket)
        .with_resource_label("location", "us-central1")
        .with_metric_label("storage_class", class)
        .with_point(Point::double(at, bytes))
}

/// A timestamp inside the lookback window.
pub fn recent() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

/// Helper to make a POST request with an empty body.
pub async fn post(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
