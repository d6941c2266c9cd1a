//! Liveness endpoint.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" when the server answers.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Project the server collects.
    pub project_id: String,
    /// Sink rows are loaded into.
    pub sink: String,
}

/// Creates the health routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Reports what a run would target. Cloud Monitoring and the sink are not contacted.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        project_id: state.pipeline().project_id().to_string(),
        sink: state.sink().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use shared::monitoring::InMemoryMonitoringBackend;
    use shared::storage::InMemoryRowSink;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_run_target() {
        let state = AppState::with_in_memory_backends(
            "billing-prod",
            InMemoryMonitoringBackend::single_page(Vec::new()),
            InMemoryRowSink::new(),
        );

        let response = health_routes(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.project_id, "billing-prod");
        assert_eq!(health.sink, "memory");
        assert!(!health.version.is_empty());
    }
}
