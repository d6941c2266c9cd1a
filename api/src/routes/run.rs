//! On-demand pipeline runs.

use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use shared::pipeline::RunSummary;

/// Body returned by a successful run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    /// Always "ok".
    pub status: String,
    /// Project collected.
    pub project_id: String,
    /// Records produced by collection.
    pub records_collected: usize,
    /// Rows committed to the table.
    pub rows_written: usize,
}

impl From<RunSummary> for RunResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            status: "ok".to_string(),
            project_id: summary.project_id,
            records_collected: summary.records_collected,
            rows_written: summary.rows_written,
        }
    }
}

/// Body returned by a failed run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunFailure {
    /// Always "failed".
    pub status: String,
    /// Failure class: `validation`, `transport` or `aggregate_write`.
    pub kind: String,
    /// Human-readable error.
    pub error: String,
}

/// Creates the run routes.
///
/// # Routes
///
/// - `POST /run` - Collect the latest snapshots and load them
pub fn run_routes(state: AppState) -> Router {
    Router::new()
        .route("/run", post(run_pipeline))
        .with_state(state)
}

/// Handler for POST /run.
///
/// Runs wait for each other; the response is sent once the rows are committed
/// or the run has failed.
async fn run_pipeline(State(state): State<AppState>) -> Response {
    match state.run_pipeline().await {
        Ok(summary) => Json(RunResponse::from(summary)).into_response(),
        Err(e) => {
            tracing::error!(
                error = %e,
                kind = %e.kind(),
                project_id = %state.pipeline().project_id(),
                "Pipeline run failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunFailure {
                    status: "failed".to_string(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
