//! Health endpoint integration tests.

use axum::http::StatusCode;
use shared::monitoring::InMemoryMonitoringBackend;
use shared::storage::InMemoryRowSink;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_does_not_touch_backends() {
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::failing("should not be called"),
        InMemoryRowSink::new(),
    );

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["project_id"], "t1");
    assert_eq!(body["sink"], "memory");
    assert_eq!(backends.monitoring.connect_count(), 0);
    assert!(backends.sink.calls().unwrap().is_empty());
}
