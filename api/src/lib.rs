//! Storewatch API Server
//!
//! Runs the bucket snapshot job either once (as a batch task) or on demand over
//! HTTP.
//!
//! # Architecture
//!
//! The server is built on Axum and Tokio, providing:
//! - `GET /health` for load balancers
//! - `POST /run` to collect the latest snapshots and load them
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod db;
mod routes;
mod state;

pub use config::{Config, SinkKind};
pub use routes::{RunFailure, RunResponse};
pub use state::{build_pipeline, AppState};

use anyhow::Result;
use axum::Router;
use shared::pipeline::RunSummary;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info`. Setting
/// `STOREWATCH_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("STOREWATCH_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Runs the pipeline once for `config`.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built or the run fails. A failed
/// run keeps its `PipelineError`, so callers can downcast for the kind.
pub async fn run_job(config: &Config) -> Result<RunSummary> {
    tracing::info!(
        task_index = %config.task_index,
        task_attempt = %config.task_attempt,
        project_id = %config.project_id,
        dataset_id = %config.dataset_id,
        table_id = %config.table_id,
        sink = %config.sink,
        "Starting task"
    );

    let pipeline = build_pipeline(config)?;
    Ok(pipeline.run().await?)
}

/// Runs the Storewatch API server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Storewatch API server with the provided configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The pipeline cannot be built
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        project_id = %config.project_id,
        sink = %config.sink,
        "Storewatch API server starting"
    );

    if config.sink == SinkKind::ClickHouse {
        match db::Database::new(&config.database).ping().await {
            Ok(()) => tracing::info!(url = %config.database.url, "Connected to ClickHouse"),
            Err(e) => tracing::warn!(error = %e, "ClickHouse is not reachable yet"),
        }
    }

    let app = create_router(AppState::from_config(&config)?);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::run_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
