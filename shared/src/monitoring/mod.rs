//! Monitoring backend abstraction.
//!
//! The `MonitoringBackend` trait opens short-lived sessions that list time series
//! page by page. Types in this module mirror the Cloud Monitoring v3 REST
//! encoding so they can be decoded straight from API responses.

pub mod cloud;
pub mod memory;

pub use cloud::CloudMonitoringBackend;
pub use memory::InMemoryMonitoringBackend;

use crate::auth::AuthError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A boxed, sendable future, used to keep the backend traits object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised while talking to the monitoring backend.
#[derive(Debug, Error)]
pub enum MonitoringError {
    /// Failed to obtain credentials.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The request could not be sent or the response not read.
    #[error("monitoring request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("monitoring API returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A page could not be decoded.
    #[error("failed to decode time series page: {0}")]
    Decode(String),
}

/// How much detail the backend returns for each series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSeriesView {
    /// Labels and points.
    #[default]
    Full,
}

impl std::fmt::Display for TimeSeriesView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "FULL"),
        }
    }
}

/// Closed time window `[start, end]` for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

/// A time series listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTimeSeriesRequest {
    /// Resource name the query is scoped to (`projects/<id>`).
    pub name: String,
    /// Monitoring filter expression.
    pub filter: String,
    /// Time window.
    pub interval: QueryWindow,
    /// Requested detail.
    pub view: TimeSeriesView,
}

impl ListTimeSeriesRequest {
    /// Builds a request for one metric type in a project.
    #[must_use]
    pub fn for_metric(project_id: &str, metric_type: &str, interval: QueryWindow) -> Self {
        Self {
            name: format!("projects/{project_id}"),
            filter: format!("metric.type=\"{metric_type}\""),
            interval,
            view: TimeSeriesView::Full,
        }
    }

    /// Query string parameters for the REST call, including the page token if any.
    #[must_use]
    pub fn query_pairs(&self, page_token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("filter", self.filter.clone()),
            (
                "interval.startTime",
                self.interval
                    .start
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "interval.endTime",
                self.interval.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("view", self.view.to_string()),
        ];
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            pairs.push(("pageToken", token.to_string()));
        }
        pairs
    }
}

/// Metric part of a time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetric {
    /// Metric type.
    #[serde(rename = "type", default)]
    pub metric_type: String,
    /// Metric labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Monitored resource part of a time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoredResource {
    /// Resource type (e.g. `gcs_bucket`).
    #[serde(rename = "type", default)]
    pub resource_type: String,
    /// Resource labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Interval of a single point; timestamps stay as sent (RFC 3339 text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointInterval {
    /// Interval start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Interval end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// `int64Value` is a decimal string in the REST encoding, but some tools send numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Int64Value {
    /// String-encoded integer.
    Text(String),
    /// Plain JSON number.
    Number(i64),
}

/// `doubleValue` is a JSON number, except that proto3 JSON sends `"NaN"`,
/// `"Infinity"` and `"-Infinity"` as strings and accepts numeric strings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DoubleValue {
    /// Plain JSON number.
    Number(f64),
    /// String-encoded double.
    #[serde(with = "double_text")]
    Text(f64),
}

impl DoubleValue {
    /// Returns the value as `f64`, non-finite values included.
    #[must_use]
    pub fn get(self) -> f64 {
        match self {
            Self::Number(v) | Self::Text(v) => v,
        }
    }
}

impl From<f64> for DoubleValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

mod double_text {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_str("Infinity")
        } else if value.is_infinite() {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.trim() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|_| de::Error::custom(format!("invalid doubleValue '{other}'"))),
        }
    }
}

/// Typed value of a point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    /// Double value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_value: Option<DoubleValue>,
    /// Integer value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int64_value: Option<Int64Value>,
}

impl TypedValue {
    /// Returns the numeric value, preferring `doubleValue`.
    ///
    /// Returns `None` if neither field is present or the integer text does not parse.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        if let Some(v) = self.double_value {
            return Some(v.get());
        }
        match self.int64_value.as_ref()? {
            Int64Value::Text(text) => text.trim().parse::<i64>().ok().map(|v| v as f64),
            Int64Value::Number(v) => Some(*v as f64),
        }
    }
}

/// A single data point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Measurement interval.
    #[serde(default)]
    pub interval: PointInterval,
    /// Measured value.
    #[serde(default)]
    pub value: TypedValue,
}

impl Point {
    /// Creates a double-valued point ending at `end_time`.
    #[must_use]
    pub fn double(end_time: DateTime<Utc>, value: f64) -> Self {
        Self {
            interval: PointInterval {
                start_time: None,
                end_time: Some(end_time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            },
            value: TypedValue {
                double_value: Some(DoubleValue::Number(value)),
                int64_value: None,
            },
        }
    }

    /// Parses the interval end time.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.interval.end_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// A labeled stream of points for one resource/metric combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Metric descriptor and labels.
    #[serde(default)]
    pub metric: SeriesMetric,
    /// Monitored resource and labels.
    #[serde(default)]
    pub resource: MonitoredResource,
    /// Points, most recent first as returned by the backend.
    #[serde(default)]
    pub points: Vec<Point>,
}

impl TimeSeries {
    /// Adds a resource label.
    #[must_use]
    pub fn with_resource_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource.labels.insert(key.into(), value.into());
        self
    }

    /// Adds a metric label.
    #[must_use]
    pub fn with_metric_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric.labels.insert(key.into(), value.into());
        self
    }

    /// Appends a point.
    #[must_use]
    pub fn with_point(mut self, point: Point) -> Self {
        self.points.push(point);
        self
    }

    /// Looks up a resource label, falling back to `default`.
    #[must_use]
    pub fn resource_label_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.resource.labels.get(key).map_or(default, String::as_str)
    }

    /// Looks up a metric label, falling back to `default`.
    #[must_use]
    pub fn metric_label_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.metric.labels.get(key).map_or(default, String::as_str)
    }
}

/// One page of a time series listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPage {
    /// Series on this page.
    #[serde(default)]
    pub time_series: Vec<TimeSeries>,
    /// Token for the next page; absent or empty on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// An open session against the monitoring backend.
pub trait TimeSeriesSource: Send + Sync {
    /// Fetches one page of results.
    fn list_page<'a>(
        &'a self,
        request: &'a ListTimeSeriesRequest,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TimeSeriesPage, MonitoringError>>;
}

/// Factory for monitoring sessions.
pub trait MonitoringBackend: Send + Sync {
    /// Opens a session. The session is released when dropped.
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn TimeSeriesSource>, MonitoringError>>;
}

/// Forward-only iterator over the pages of one listing.
pub struct TimeSeriesPager<'a> {
    source: &'a dyn TimeSeriesSource,
    request: &'a ListTimeSeriesRequest,
    next_token: Option<String>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> TimeSeriesPager<'a> {
    /// Starts a listing at the first page.
    #[must_use]
    pub fn new(source: &'a dyn TimeSeriesSource, request: &'a ListTimeSeriesRequest) -> Self {
        Self {
            source,
            request,
            next_token: None,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Returns the next page's series, or `None` once the listing is drained.
    ///
    /// # Errors
    ///
    /// Returns an error if a page cannot be fetched.
    pub async fn next_page(&mut self) -> Result<Option<Vec<TimeSeries>>, MonitoringError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .source
            .list_page(self.request, self.next_token.as_deref())
            .await?;
        self.pages_fetched += 1;

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => self.next_token = Some(token),
            None => self.exhausted = true,
        }

        Ok(Some(page.time_series))
    }

    /// Number of pages fetched so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
