//! Storewatch Shared Library
//!
//! This crate contains the collect-transform-load pipeline that snapshots Cloud
//! Storage bucket sizes from Cloud Monitoring into an analytical table.
//!
//! # Modules
//!
//! - [`models`] - The validated `MetricRecord`
//! - [`monitoring`] - Monitoring backend abstraction and implementations
//! - [`collector`] - Turns time series into records
//! - [`storage`] - Row sinks (`BigQuery`, `ClickHouse`, in-memory)
//! - [`loader`] - Bulk loading with aggregated row errors
//! - [`pipeline`] - Collect then load
//!
//! # Example
//!
//! ```
//! use shared::collector::Collector;
//! use shared::loader::Loader;
//! use shared::monitoring::{InMemoryMonitoringBackend, Point, TimeSeries};
//! use shared::pipeline::Pipeline;
//! use shared::storage::{InMemoryRowSink, TableRef};
//! use std::sync::Arc;
//!
//! let series = TimeSeries::default()
//!     .with_resource_label("project_id", "my-project")
//!     .with_resource_label("bucket_name", "my-bucket")
//!     .with_point(Point::double(chrono::Utc::now(), 1024.0));
//!
//! let sink = InMemoryRowSink::new_shared();
//! let pipeline = Pipeline::new(
//!     "my-project",
//!     Collector::new(Arc::new(InMemoryMonitoringBackend::single_page(vec![series]))),
//!     Loader::new(sink.clone(), TableRef::new("my-project", "gcs_storage_costs", "bucket_snapshots")),
//! );
//!
//! let summary = tokio_test::block_on(pipeline.run()).unwrap();
//! assert_eq!(summary.rows_written, 1);
//! assert_eq!(sink.rows().unwrap()[0].region, "unknown");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod collector;
pub mod loader;
pub mod models;
pub mod monitoring;
pub mod pipeline;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
