//! `ClickHouse`-backed row sink.
//!
//! The dataset maps to a `ClickHouse` database and `observed_at` is written as a
//! `DateTime64(6, 'UTC')` value. Expected table layout:
//!
//! ```sql
//! CREATE TABLE gcs_storage_costs.bucket_snapshots (
//!     observed_at   DateTime64(6, 'UTC'),
//!     region        String,
//!     gcp_project   String,
//!     bucket_name   String,
//!     storage_class String,
//!     total_bytes   Float64
//! ) ENGINE = MergeTree ORDER BY (gcp_project, bucket_name, observed_at)
//! ```

use super::{
    BoxFuture, InsertAllResponse, RowSink, SinkError, SnapshotRow, TableRef, OBSERVED_AT_FORMAT,
};
use chrono::NaiveDateTime;
use std::sync::Arc;

#[derive(::clickhouse::Row, serde::Serialize)]
struct ClickHouseSnapshotRow {
    observed_at: i64,
    region: String,
    gcp_project: String,
    bucket_name: String,
    storage_class: String,
    total_bytes: f64,
}

/// Parses the row timestamp back into microseconds since the epoch.
fn observed_at_micros(observed_at: &str) -> Result<i64, String> {
    NaiveDateTime::parse_from_str(observed_at, OBSERVED_AT_FORMAT)
        .map(|t| t.and_utc().timestamp_micros())
        .map_err(|e| format!("invalid observed_at '{observed_at}': {e}"))
}

/// Converts rows for the wire. All rows are checked before anything is written.
fn convert_rows(
    rows: Vec<SnapshotRow>,
) -> Result<Vec<ClickHouseSnapshotRow>, InsertAllResponse> {
    let mut converted = Vec::with_capacity(rows.len());
    let mut rejected = InsertAllResponse::ok();

    for (index, row) in rows.into_iter().enumerate() {
        match observed_at_micros(&row.observed_at) {
            Ok(observed_at) => converted.push(ClickHouseSnapshotRow {
                observed_at,
                region: row.region,
                gcp_project: row.gcp_project,
                bucket_name: row.bucket_name,
                storage_class: row.storage_class,
                total_bytes: row.total_bytes,
            }),
            Err(message) => rejected.add_error(index, message),
        }
    }

    if rejected.has_errors() {
        Err(rejected)
    } else {
        Ok(converted)
    }
}

/// `ClickHouse` row sink implementation.
///
/// `ClickHouse` inserts are all-or-nothing, so row errors only come from rows
/// that cannot be encoded; in that case nothing is sent.
#[derive(Clone)]
pub struct ClickHouseRowSink {
    client: Arc<::clickhouse::Client>,
}

impl ClickHouseRowSink {
    /// Creates a new `ClickHouse` row sink with the given client.
    #[must_use]
    pub fn new(client: Arc<::clickhouse::Client>) -> Self {
        Self { client }
    }

    /// Creates a new `ClickHouse` row sink wrapped in an Arc.
    #[must_use]
    pub fn new_shared(client: Arc<::clickhouse::Client>) -> Arc<Self> {
        Arc::new(Self::new(client))
    }

    async fn write_rows(
        client: ::clickhouse::Client,
        table: &str,
        rows: Vec<ClickHouseSnapshotRow>,
    ) -> Result<(), ::clickhouse::error::Error> {
        let mut inserter = client.insert::<ClickHouseSnapshotRow>(table).await?;
        for row in &rows {
            inserter.write(row).await?;
        }
        inserter.end().await?;
        Ok(())
    }
}

impl RowSink for ClickHouseRowSink {
    fn insert_all<'a>(
        &'a self,
        table: &'a TableRef,
        rows: Vec<SnapshotRow>,
    ) -> BoxFuture<'a, Result<InsertAllResponse, SinkError>> {
        Box::pin(async move {
            let rows = match convert_rows(rows) {
                Ok(rows) => rows,
                Err(rejected) => return Ok(rejected),
            };

            let client = self.client.as_ref().clone().with_database(&table.dataset_id);
            Self::write_rows(client, &table.table_id, rows)
                .await
                .map_err(|e| SinkError::Request(e.to_string()))?;

            Ok(InsertAllResponse::ok())
        })
    }
}
