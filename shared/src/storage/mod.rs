//! Row sinks.
//!
//! This module provides the `RowSink` trait for bulk row inserts that report
//! failures per row, and the `SnapshotRow` layout of the `bucket_snapshots` table.
//! Implementations exist for `BigQuery`, `ClickHouse` and in-memory use.

pub mod bigquery_sink;
pub mod clickhouse_sink;
pub mod memory_sink;

pub use bigquery_sink::BigQueryRowSink;
pub use clickhouse_sink::ClickHouseRowSink;
pub use memory_sink::InMemoryRowSink;

use crate::auth::AuthError;
use crate::models::MetricRecord;
use crate::monitoring::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Timestamp layout of the `observed_at` column (UTC, microsecond precision).
pub const OBSERVED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Errors that keep a sink from accepting a batch at all.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to obtain credentials.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The request could not be sent or the response not read.
    #[error("sink request failed: {0}")]
    Request(String),

    /// The sink answered with a non-success status.
    #[error("sink returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The sink's response could not be decoded.
    #[error("failed to decode sink response: {0}")]
    Decode(String),

    /// Failed to acquire a lock on an in-process sink.
    #[error("Failed to acquire lock on row sink")]
    LockError,
}

/// Fully qualified target table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Project owning the dataset.
    pub project_id: String,
    /// Dataset (database) name.
    pub dataset_id: String,
    /// Table name.
    pub table_id: String,
}

impl TableRef {
    /// Creates a table reference.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.dataset_id, self.table_id)
    }
}

/// One row of the snapshot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// `yyyy-MM-dd HH:mm:ss.ffffff`, UTC.
    pub observed_at: String,
    /// Bucket location.
    pub region: String,
    /// Owning project.
    pub gcp_project: String,
    /// Bucket name.
    pub bucket_name: String,
    /// Storage class.
    pub storage_class: String,
    /// Bytes stored.
    pub total_bytes: f64,
}

impl From<&MetricRecord> for SnapshotRow {
    fn from(record: &MetricRecord) -> Self {
        Self {
            observed_at: record.observed_at().format(OBSERVED_AT_FORMAT).to_string(),
            region: record.region().to_string(),
            gcp_project: record.project_id().to_string(),
            bucket_name: record.bucket_name().to_string(),
            storage_class: record.storage_class().to_string(),
            total_bytes: record.total_bytes(),
        }
    }
}

/// Outcome of a bulk insert: rejected row indices with their messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertAllResponse {
    /// Row index to error messages, ordered by index.
    pub insert_errors: BTreeMap<usize, Vec<String>>,
}

impl InsertAllResponse {
    /// A response with no row errors.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Returns true if any row was rejected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.insert_errors.is_empty()
    }

    /// Records an error message against a row.
    pub fn add_error(&mut self, index: usize, message: impl Into<String>) {
        self.insert_errors
            .entry(index)
            .or_default()
            .push(message.into());
    }
}

/// Trait for bulk row-insert sinks.
///
/// Implementations must be thread-safe (Send + Sync). A returned `Ok` may still
/// carry row errors; callers decide how to report them.
pub trait RowSink: Send + Sync {
    /// Inserts all `rows` into `table` in one operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be reached or its answer is unusable.
    fn insert_all<'a>(
        &'a self,
        table: &'a TableRef,
        rows: Vec<SnapshotRow>,
    ) -> BoxFuture<'a, Result<InsertAllResponse, SinkError>>;
}
