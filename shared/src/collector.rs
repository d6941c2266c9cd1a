//! Bucket size collection.
//!
//! `Collector` queries the monitoring backend for the last day of
//! `storage.googleapis.com/storage/v2/total_bytes` samples and turns each series
//! into at most one [`MetricRecord`].

use crate::models::{MetricRecord, RecordValidationError};
use crate::monitoring::{
    ListTimeSeriesRequest, MonitoringBackend, MonitoringError, QueryWindow, TimeSeries,
    TimeSeriesPager,
};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Metric type collected.
pub const TOTAL_BYTES_METRIC: &str = "storage.googleapis.com/storage/v2/total_bytes";

/// Value used for labels missing from a series.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The project id was empty.
    #[error("project id cannot be null or empty")]
    InvalidProject,

    /// The backend could not be queried.
    #[error(transparent)]
    Transport(#[from] MonitoringError),

    /// A series could not be turned into a valid record.
    #[error("invalid time series data: {0}")]
    Validation(#[from] RecordValidationError),
}

/// Returns the one-day window ending at `now`, truncated to whole seconds.
#[must_use]
pub fn lookback_window(now: DateTime<Utc>) -> QueryWindow {
    let end = now.trunc_subsecs(0);
    QueryWindow {
        start: end - TimeDelta::days(1),
        end,
    }
}

/// Builds a record from the first point of `series`.
///
/// Returns `Ok(None)` when the series has no points. Point 0 is taken as the
/// most recent sample exactly as the backend ordered it.
///
/// # Errors
///
/// Returns an error if the point lacks a usable end time or value, or if the
/// resulting record fails validation.
pub fn record_from_series(series: &TimeSeries) -> Result<Option<MetricRecord>, RecordValidationError> {
    let Some(point) = series.points.first() else {
        return Ok(None);
    };

    let observed_at = point
        .end_time()
        .ok_or(RecordValidationError::MissingObservedAt)?;
    let total_bytes = point
        .value
        .as_f64()
        .ok_or(RecordValidationError::MissingValue)?;

    MetricRecord::new(
        observed_at,
        series.resource_label_or("location", UNKNOWN_LABEL),
        series.resource_label_or("project_id", UNKNOWN_LABEL),
        series.resource_label_or("bucket_name", UNKNOWN_LABEL),
        series.metric_label_or("storage_class", UNKNOWN_LABEL),
        total_bytes,
    )
    .map(Some)
}

/// Collects bucket size snapshots from a monitoring backend.
#[derive(Clone)]
pub struct Collector {
    backend: Arc<dyn MonitoringBackend>,
}

impl Collector {
    /// Creates a collector over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn MonitoringBackend>) -> Self {
        Self { backend }
    }

    /// Collects one record per series observed for `project_id` during the last day.
    ///
    /// A backend session is opened for the duration of the call and released
    /// on return. Records keep the backend's series order.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `project_id` is blank
    /// - the backend cannot be reached or a page cannot be fetched
    /// - a series carries a point that cannot form a valid record
    pub async fn collect(&self, project_id: &str) -> Result<Vec<MetricRecord>, CollectError> {
        if project_id.trim().is_empty() {
            return Err(CollectError::InvalidProject);
        }

        let request = ListTimeSeriesRequest::for_metric(
            project_id,
            TOTAL_BYTES_METRIC,
            lookback_window(Utc::now()),
        );

        let session = self.backend.connect().await?;
        let mut pager = TimeSeriesPager::new(session.as_ref(), &request);
        let mut records = Vec::new();
        let mut series_seen = 0usize;

        while let Some(page) = pager.next_page().await? {
            for series in &page {
                series_seen += 1;
                match record_from_series(series)? {
                    Some(record) => records.push(record),
                    None => tracing::debug!(
                        bucket = series.resource_label_or("bucket_name", UNKNOWN_LABEL),
                        "Skipping time series without points"
                    ),
                }
            }
        }

        tracing::debug!(
            project_id = %project_id,
            pages = pager.pages_fetched(),
            series = series_seen,
            records = records.len(),
            "Collected time series"
        );

        Ok(records)
    }
}
