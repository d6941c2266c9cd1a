//! Bulk loading of metric records into a row sink.

use crate::models::MetricRecord;
use crate::storage::{InsertAllResponse, RowSink, SinkError, SnapshotRow, TableRef};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while loading records.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The sink could not be reached or gave an unusable answer.
    #[error(transparent)]
    Transport(#[from] SinkError),

    /// The sink rejected one or more rows. Nothing should be assumed written.
    #[error("{message}")]
    AggregateWrite {
        /// Number of distinct rows rejected.
        failed_rows: usize,
        /// One line per failed row: `Row <index>: <m1>; <m2>`.
        message: String,
    },
}

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    /// Rows committed to the sink.
    pub rows_written: usize,
}

/// Folds per-row errors into a single report, rows in ascending order.
#[must_use]
pub fn aggregate_report(response: &InsertAllResponse) -> String {
    let mut report = String::from("Bulk insert errors:");
    for (index, messages) in &response.insert_errors {
        let _ = write!(report, "\nRow {index}: {}", messages.join("; "));
    }
    report
}

/// Writes batches of records to a fixed table.
#[derive(Clone)]
pub struct Loader {
    sink: Arc<dyn RowSink>,
    table: TableRef,
}

impl Loader {
    /// Creates a loader writing to `table` through `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn RowSink>, table: TableRef) -> Self {
        Self { sink, table }
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Writes all `records` in one bulk insert.
    ///
    /// An empty batch succeeds without contacting the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the sink cannot be reached (`LoadError::Transport`)
    /// - the sink rejects any row (`LoadError::AggregateWrite`, covering every rejected row)
    pub async fn load(&self, records: &[MetricRecord]) -> Result<LoadSummary, LoadError> {
        if records.is_empty() {
            tracing::info!("No rows to insert");
            return Ok(LoadSummary::default());
        }

        let rows: Vec<SnapshotRow> = records.iter().map(SnapshotRow::from).collect();
        let row_count = rows.len();

        let response = self.sink.insert_all(&self.table, rows).await?;

        if response.has_errors() {
            let failed_rows = response.insert_errors.len();
            tracing::error!(
                table = %self.table,
                failed_rows,
                "Bulk insert rejected rows"
            );
            return Err(LoadError::AggregateWrite {
                failed_rows,
                message: aggregate_report(&response),
            });
        }

        tracing::info!(
            rows = row_count,
            table = %self.table,
            "Successfully inserted rows"
        );

        Ok(LoadSummary {
            rows_written: row_count,
        })
    }
}
