//! `POST /run` integration tests.

use axum::http::StatusCode;
use shared::monitoring::{InMemoryMonitoringBackend, TimeSeries, TimeSeriesPage};
use shared::storage::InMemoryRowSink;

use super::common::{bucket_series, post, recent, test_app, PROJECT};

fn page(time_series: Vec<TimeSeries>) -> TimeSeriesPage {
    TimeSeriesPage {
        time_series,
        next_page_token: None,
    }
}

#[tokio::test]
async fn test_run_loads_every_bucket_and_class() {
    let at = recent();
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::single_page(vec![
            bucket_series("hot", "STANDARD", 4096.0, at),
            bucket_series("cold", "ARCHIVE", 1.5e9, at),
        ]),
        InMemoryRowSink::new(),
    );

    let (status, body) = post(app, "/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["project_id"], PROJECT);
    assert_eq!(body["records_collected"], 2);
    assert_eq!(body["rows_written"], 2);

    let calls = backends.sink.calls().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].table.to_string(), "gcs_storage_costs.bucket_snapshots");

    let rows = &calls[0].rows;
    assert_eq!(rows[0].bucket_name, "hot");
    assert_eq!(rows[0].storage_class, "STANDARD");
    assert_eq!(rows[0].region, "us-central1");
    assert_eq!(rows[1].gcp_project, PROJECT);
    assert!((rows[1].total_bytes - 1.5e9).abs() < f64::EPSILON);
    assert_eq!(backends.monitoring.open_sessions(), 0);
}

#[tokio::test]
async fn test_run_follows_pages() {
    let at = recent();
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::new(vec![
            page(vec![bucket_series("a", "STANDARD", 1.0, at)]),
            page(vec![bucket_series("b", "NEARLINE", 2.0, at)]),
            page(vec![bucket_series("c", "COLDLINE", 3.0, at)]),
        ]),
        InMemoryRowSink::new(),
    );

    let (status, body) = post(app, "/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_written"], 3);
    assert_eq!(backends.monitoring.requests().len(), 3);
    assert_eq!(backends.monitoring.connect_count(), 1);
}

#[tokio::test]
async fn test_run_with_no_data_skips_sink() {
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::single_page(Vec::new()),
        InMemoryRowSink::new(),
    );

    let (status, body) = post(app, "/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records_collected"], 0);
    assert_eq!(body["rows_written"], 0);
    assert!(backends.sink.calls().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_defaults_missing_labels() {
    let series = TimeSeries::default()
        .with_resource_label("project_id", PROJECT)
        .with_resource_label("bucket_name", "bare")
        .with_point(shared::monitoring::Point::double(recent(), 10.0));
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::single_page(vec![series]),
        InMemoryRowSink::new(),
    );

    let (status, _) = post(app, "/run").await;

    assert_eq!(status, StatusCode::OK);
    let rows = backends.sink.rows().unwrap();
    assert_eq!(rows[0].region, "unknown");
    assert_eq!(rows[0].storage_class, "unknown");
}

#[tokio::test]
async fn test_run_reports_row_errors() {
    let at = recent();
    let (app, _) = test_app(
        InMemoryMonitoringBackend::single_page(vec![
            bucket_series("a", "STANDARD", 1.0, at),
            bucket_series("b", "STANDARD", 2.0, at),
            bucket_series("c", "STANDARD", 3.0, at),
        ]),
        InMemoryRowSink::new()
            .with_row_errors(2, ["invalid value"])
            .with_row_errors(0, ["no such field", "bad row"]),
    );

    let (status, body) = post(app, "/run").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["kind"], "aggregate_write");
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Bulk insert errors:"));
    assert!(error.contains("Row 0: no such field; bad row"));
    assert!(error.contains("Row 2: invalid value"));
    assert!(error.find("Row 0").unwrap() < error.find("Row 2").unwrap());
}

#[tokio::test]
async fn test_run_reports_monitoring_outage() {
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::failing("permission denied"),
        InMemoryRowSink::new(),
    );

    let (status, body) = post(app, "/run").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "transport");
    assert!(body["error"].as_str().unwrap().contains("permission denied"));
    assert!(backends.sink.calls().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_rejects_negative_bytes_before_loading() {
    let (app, backends) = test_app(
        InMemoryMonitoringBackend::single_page(vec![bucket_series("neg", "STANDARD", -1.0, recent())]),
        InMemoryRowSink::new(),
    );

    let (status, body) = post(app, "/run").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "validation");
    assert!(backends.sink.calls().unwrap().is_empty());
    assert_eq!(backends.monitoring.open_sessions(), 0);
}
