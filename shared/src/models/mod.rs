//! Data models for Storewatch.
//!
//! This module contains the validated record produced by collection and consumed by loading.

pub mod metric;

pub use metric::{MetricRecord, RecordValidationError};
