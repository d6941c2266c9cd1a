//! Collect-then-load job.

use crate::collector::{CollectError, Collector};
use crate::loader::{LoadError, Loader};
use serde::Serialize;
use thiserror::Error;

/// Broad classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Data failed record validation.
    Validation,
    /// A remote call failed.
    Transport,
    /// The sink rejected rows.
    AggregateWrite,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Transport => write!(f, "transport"),
            Self::AggregateWrite => write!(f, "aggregate_write"),
        }
    }
}

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Collection failed.
    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),

    /// Loading failed.
    #[error("load failed: {0}")]
    Load(#[from] LoadError),
}

impl PipelineError {
    /// Returns the failure class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Collect(CollectError::Transport(_)) | Self::Load(LoadError::Transport(_)) => {
                ErrorKind::Transport
            }
            Self::Collect(CollectError::InvalidProject | CollectError::Validation(_)) => {
                ErrorKind::Validation
            }
            Self::Load(LoadError::AggregateWrite { .. }) => ErrorKind::AggregateWrite,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Project collected.
    pub project_id: String,
    /// Records produced by collection.
    pub records_collected: usize,
    /// Rows committed by the loader.
    pub rows_written: usize,
}

/// One project's collect-and-load job.
#[derive(Clone)]
pub struct Pipeline {
    project_id: String,
    collector: Collector,
    loader: Loader,
}

impl Pipeline {
    /// Creates a pipeline for `project_id`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, collector: Collector, loader: Loader) -> Self {
        Self {
            project_id: project_id.into(),
            collector,
            loader,
        }
    }

    /// Returns the project this pipeline collects.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Collects the latest snapshots and loads them.
    ///
    /// # Errors
    ///
    /// Returns an error if collection or loading fails; nothing is retried.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        tracing::info!(
            project_id = %self.project_id,
            "Starting GCS storage metrics collection"
        );

        let records = self.collector.collect(&self.project_id).await?;

        if records.is_empty() {
            tracing::info!("No metrics data found");
            return Ok(RunSummary {
                project_id: self.project_id.clone(),
                records_collected: 0,
                rows_written: 0,
            });
        }

        tracing::info!(count = records.len(), "Retrieved metric records");
        for record in &records {
            tracing::debug!(%record, "Collected record");
        }

        let summary = self.loader.load(&records).await?;

        tracing::info!(
            rows = summary.rows_written,
            table = %self.loader.table(),
            "Successfully processed records"
        );

        Ok(RunSummary {
            project_id: self.project_id.clone(),
            records_collected: records.len(),
            rows_written: summary.rows_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{InMemoryMonitoringBackend, Point, TimeSeries};
    use crate::storage::{InMemoryRowSink, TableRef};
    use chrono::Utc;
    use std::sync::Arc;

    fn series(bucket: &str, class: &str, bytes: f64) -> TimeSeries {
        TimeSeries::default()
            .with_resource_label("project_id", "t1")
            .with_resource_label("bucket_name", bucket)
            .with_resource_label("location", "us-central1")
            .with_metric_label("storage_class", class)
            .with_point(Point::double(Utc::now(), bytes))
    }

    fn pipeline(backend: InMemoryMonitoringBackend, sink: &InMemoryRowSink) -> Pipeline {
        Pipeline::new(
            "t1",
            Collector::new(Arc::new(backend)),
            Loader::new(
                Arc::new(sink.clone()),
                TableRef::new("t1", "gcs_storage_costs", "bucket_snapshots"),
            ),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_two_classes() {
        let backend = InMemoryMonitoringBackend::single_page(vec![
            series("hot", "STANDARD", 4096.0),
            series("cold", "ARCHIVE", 1.5e9),
        ]);
        let sink = InMemoryRowSink::new();

        let summary = pipeline(backend, &sink).run().await.unwrap();

        assert_eq!(summary.records_collected, 2);
        assert_eq!(summary.rows_written, 2);

        let rows = sink.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.gcp_project == "t1"));
        assert!(rows.iter().all(|r| r.total_bytes > 0.0));
        let classes: Vec<&str> = rows.iter().map(|r| r.storage_class.as_str()).collect();
        assert_eq!(classes, vec!["STANDARD", "ARCHIVE"]);
    }

    #[tokio::test]
    async fn test_no_data_does_not_touch_sink() {
        let backend = InMemoryMonitoringBackend::single_page(Vec::new());
        let sink = InMemoryRowSink::new();

        let summary = pipeline(backend, &sink).run().await.unwrap();

        assert_eq!(summary.records_collected, 0);
        assert!(sink.calls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_kinds() {
        let sink = InMemoryRowSink::new();
        let err = pipeline(InMemoryMonitoringBackend::failing("down"), &sink)
            .run()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let backend = InMemoryMonitoringBackend::single_page(vec![series("b", "STANDARD", -5.0)]);
        let err = pipeline(backend, &sink).run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let rejecting = InMemoryRowSink::new().with_row_errors(0, ["no such field"]);
        let backend = InMemoryMonitoringBackend::single_page(vec![series("b", "STANDARD", 1.0)]);
        let err = pipeline(backend, &rejecting).run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AggregateWrite);
        assert!(err.to_string().contains("Row 0: no such field"));

        let unreachable = InMemoryRowSink::new().with_transport_failure("refused");
        let backend = InMemoryMonitoringBackend::single_page(vec![series("b", "STANDARD", 1.0)]);
        let err = pipeline(backend, &unreachable).run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Validation.to_string(), "validation");
        assert_eq!(ErrorKind::AggregateWrite.to_string(), "aggregate_write");
    }
}
