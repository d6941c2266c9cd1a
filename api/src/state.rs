//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::{Config, SinkKind};
use crate::db::Database;
use anyhow::{Context, Result};
use shared::auth::TokenProvider;
use shared::collector::Collector;
use shared::loader::Loader;
use shared::monitoring::{CloudMonitoringBackend, InMemoryMonitoringBackend};
use shared::pipeline::{Pipeline, PipelineError, RunSummary};
use shared::storage::{BigQueryRowSink, ClickHouseRowSink, InMemoryRowSink, RowSink, TableRef};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state shared across all request handlers.
///
/// Holds the configured pipeline. Triggered runs are serialized so at most one
/// collection is in flight at a time.
#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    sink: String,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Creates a new application state around `pipeline`, which writes to the
    /// sink named `sink`.
    #[must_use]
    pub fn new(pipeline: Pipeline, sink: impl Into<String>) -> Self {
        Self {
            pipeline,
            sink: sink.into(),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wires the Cloud Monitoring backend and the configured sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(build_pipeline(config)?, config.sink.to_string()))
    }

    /// Creates a new application state over in-memory backends.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_backends(
        project_id: &str,
        backend: InMemoryMonitoringBackend,
        sink: InMemoryRowSink,
    ) -> Self {
        let pipeline = Pipeline::new(
            project_id,
            Collector::new(Arc::new(backend)),
            Loader::new(
                Arc::new(sink),
                TableRef::new(project_id, "gcs_storage_costs", "bucket_snapshots"),
            ),
        );
        Self::new(pipeline, "memory")
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the name of the sink rows are written to.
    #[must_use]
    pub fn sink(&self) -> &str {
        &self.sink
    }

    /// Runs the pipeline once, waiting for any run already in progress.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error unchanged.
    pub async fn run_pipeline(&self) -> Result<RunSummary, PipelineError> {
        let _guard = self.run_lock.lock().await;
        self.pipeline.run().await
    }
}

/// Builds the production pipeline described by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let tokens = TokenProvider::from_optional(config.access_token.clone());

    let backend = CloudMonitoringBackend::new(http.clone(), &config.monitoring_url, tokens.clone());

    let sink: Arc<dyn RowSink> = match config.sink {
        SinkKind::BigQuery => Arc::new(BigQueryRowSink::new(http, &config.bigquery_url, tokens)),
        SinkKind::ClickHouse => ClickHouseRowSink::new_shared(Database::new(&config.database).client()),
    };

    let table = TableRef::new(&config.project_id, &config.dataset_id, &config.table_id);

    Ok(Pipeline::new(
        &config.project_id,
        Collector::new(Arc::new(backend)),
        Loader::new(sink, table),
    ))
}
