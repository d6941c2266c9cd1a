//! Metric record data model.
//!
//! Defines `MetricRecord`, one validated snapshot of the total bytes stored in a
//! Cloud Storage bucket (`storage.googleapis.com/storage/v2/total_bytes`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Errors that can occur while constructing a [`MetricRecord`].
#[derive(Debug, Error)]
pub enum RecordValidationError {
    /// The observation timestamp is absent or could not be read.
    #[error("observed_at cannot be null")]
    MissingObservedAt,

    /// A required text field is empty or whitespace only.
    #[error("{field} cannot be null or empty")]
    Blank {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The byte total is below zero.
    #[error("total_bytes cannot be negative (got {0})")]
    NegativeBytes(f64),

    /// The byte total is NaN or infinite.
    #[error("total_bytes must be a finite number")]
    NonFiniteBytes,

    /// The data point carried no numeric value.
    #[error("data point has no numeric value")]
    MissingValue,

    /// Validation failed on a check without a dedicated variant.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Validated fields, in the order their errors are reported.
const VALIDATED_FIELDS: [&str; 5] = [
    "region",
    "project_id",
    "bucket_name",
    "storage_class",
    "total_bytes",
];

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn finite_non_negative(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("non_finite"));
    }
    if value < 0.0 {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

/// One observed measurement of a bucket's storage usage.
///
/// Instances can only be obtained through [`MetricRecord::new`], so every record
/// in circulation satisfies the invariants checked there.
///
/// # Example
///
/// ```
/// use shared::models::MetricRecord;
/// use chrono::Utc;
///
/// let record = MetricRecord::new(
///     Utc::now(),
///     "us-central1",
///     "my-project",
///     "my-bucket",
///     "STANDARD",
///     1_048_576.0,
/// )
/// .unwrap();
///
/// assert_eq!(record.bucket_name(), "my-bucket");
/// assert!(MetricRecord::new(None, "us", "p", "b", "STANDARD", 1.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct MetricRecord {
    /// End of the measurement interval.
    observed_at: DateTime<Utc>,

    /// Bucket location.
    #[validate(custom(function = "not_blank"))]
    region: String,

    /// Project that owns the bucket.
    #[validate(custom(function = "not_blank"))]
    project_id: String,

    /// Bucket name.
    #[validate(custom(function = "not_blank"))]
    bucket_name: String,

    /// Storage class label (STANDARD, NEARLINE, ...).
    #[validate(custom(function = "not_blank"))]
    storage_class: String,

    /// Total bytes stored.
    #[validate(custom(function = "finite_non_negative"))]
    total_bytes: f64,
}

impl MetricRecord {
    /// Creates a validated metric record.
    ///
    /// # Arguments
    ///
    /// * `observed_at` - End time of the measurement interval; `None` is rejected
    /// * `region` - Bucket location
    /// * `project_id` - Owning project
    /// * `bucket_name` - Bucket name
    /// * `storage_class` - Storage tier label
    /// * `total_bytes` - Bytes stored, must be finite and non-negative
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `observed_at` is `None`
    /// - any text field is empty after trimming
    /// - `total_bytes` is negative, NaN or infinite
    pub fn new(
        observed_at: impl Into<Option<DateTime<Utc>>>,
        region: impl Into<String>,
        project_id: impl Into<String>,
        bucket_name: impl Into<String>,
        storage_class: impl Into<String>,
        total_bytes: f64,
    ) -> Result<Self, RecordValidationError> {
        let observed_at = observed_at
            .into()
            .ok_or(RecordValidationError::MissingObservedAt)?;

        let record = Self {
            observed_at,
            region: region.into(),
            project_id: project_id.into(),
            bucket_name: bucket_name.into(),
            storage_class: storage_class.into(),
            total_bytes,
        };
        record.check_invariants()?;
        Ok(record)
    }

    fn check_invariants(&self) -> Result<(), RecordValidationError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };

        let reported = {
            let field_errors = errors.field_errors();
            VALIDATED_FIELDS.into_iter().find_map(|field| {
                let error = field_errors.get(field)?.first()?;
                match &*error.code {
                    "blank" => Some(RecordValidationError::Blank { field }),
                    "non_finite" => Some(RecordValidationError::NonFiniteBytes),
                    "negative" => Some(RecordValidationError::NegativeBytes(self.total_bytes)),
                    _ => None,
                }
            })
        };

        if let Some(error) = reported {
            return Err(error);
        }
        Err(RecordValidationError::Validation(errors))
    }

    /// Returns the end of the measurement interval.
    #[must_use]
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Returns the bucket location.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the owning project id.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Returns the storage class label.
    #[must_use]
    pub fn storage_class(&self) -> &str {
        &self.storage_class
    }

    /// Returns the total bytes stored.
    #[must_use]
    pub fn total_bytes(&self) -> f64 {
        self.total_bytes
    }
}

impl std::fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GcsMetric[project={} bucket={}, region={}, class={}, bytes={:.2}, time={}]",
            self.project_id,
            self.bucket_name,
            self.region,
            self.storage_class,
            self.total_bytes,
            self.observed_at.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_record_new_reads_back_fields() {
        let record = MetricRecord::new(
            observed(),
            "us-central1",
            "my-project",
            "my-bucket",
            "STANDARD",
            1_048_576.0,
        )
        .unwrap();

        assert_eq!(record.observed_at(), observed());
        assert_eq!(record.region(), "us-central1");
        assert_eq!(record.project_id(), "my-project");
        assert_eq!(record.bucket_name(), "my-bucket");
        assert_eq!(record.storage_class(), "STANDARD");
        assert!((record.total_bytes() - 1_048_576.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_accepts_zero_bytes() {
        let record = MetricRecord::new(observed(), "eu", "p", "b", "ARCHIVE", 0.0);
        assert!(record.is_ok());
    }

    #[test]
    fn test_record_missing_observed_at() {
        let result = MetricRecord::new(None, "eu", "p", "b", "STANDARD", 1.0);
        assert!(matches!(
            result,
            Err(RecordValidationError::MissingObservedAt)
        ));
    }

    #[test]
    fn test_record_blank_fields() {
        let cases = [
            ("region", MetricRecord::new(observed(), "  ", "p", "b", "S", 1.0)),
            ("project_id", MetricRecord::new(observed(), "r", "", "b", "S", 1.0)),
            ("bucket_name", MetricRecord::new(observed(), "r", "p", "\t", "S", 1.0)),
            ("storage_class", MetricRecord::new(observed(), "r", "p", "b", " \n", 1.0)),
        ];

        for (expected, result) in cases {
            match result {
                Err(RecordValidationError::Blank { field }) => assert_eq!(field, expected),
                other => panic!("expected blank {expected} error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_record_negative_bytes() {
        let result = MetricRecord::new(observed(), "r", "p", "b", "S", -0.5);
        assert!(matches!(result, Err(RecordValidationError::NegativeBytes(_))));
    }

    #[test]
    fn test_record_non_finite_bytes() {
        for value in [f64::NAN, f64::INFINITY] {
            let result = MetricRecord::new(observed(), "r", "p", "b", "S", value);
            assert!(matches!(result, Err(RecordValidationError::NonFiniteBytes)));
        }
    }

    #[test]
    fn test_record_reports_first_invalid_field() {
        let result = MetricRecord::new(observed(), "r", " ", "", "S", f64::NAN);
        match result {
            Err(RecordValidationError::Blank { field }) => assert_eq!(field, "project_id"),
            other => panic!("expected blank project_id, got {other:?}"),
        }
    }

    #[test]
    fn test_record_boundary_bytes() {
        assert!(MetricRecord::new(observed(), "r", "p", "b", "S", -0.0).is_ok());
        assert!(MetricRecord::new(observed(), "r", "p", "b", "S", f64::MIN_POSITIVE).is_ok());
        assert!(matches!(
            MetricRecord::new(observed(), "r", "p", "b", "S", -1e-300),
            Err(RecordValidationError::NegativeBytes(_))
        ));
        assert!(matches!(
            MetricRecord::new(observed(), "r", "p", "b", "S", f64::NEG_INFINITY),
            Err(RecordValidationError::NonFiniteBytes)
        ));
    }

    #[test]
    fn test_record_display() {
        let record = MetricRecord::new(observed(), "us", "p1", "logs", "NEARLINE", 2048.0).unwrap();
        let text = record.to_string();

        assert!(text.contains("project=p1"));
        assert!(text.contains("bucket=logs"));
        assert!(text.contains("bytes=2048.00"));
    }

    #[test]
    fn test_record_serialization() {
        let record = MetricRecord::new(observed(), "us", "p1", "logs", "STANDARD", 10.0).unwrap();
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("\"bucket_name\":\"logs\""));
        assert!(json.contains("\"observed_at\":\"2024-01-15T10:30:00Z\""));
    }
}
