//! `BigQuery` streaming insert sink (`tabledata.insertAll`).

use super::{BoxFuture, InsertAllResponse, RowSink, SinkError, SnapshotRow, TableRef};
use crate::auth::TokenProvider;
use serde::{Deserialize, Serialize};

/// Default `BigQuery` API endpoint.
pub const DEFAULT_BIGQUERY_URL: &str = "https://bigquery.googleapis.com";

#[derive(Debug, Serialize)]
struct InsertAllRequestBody<'a> {
    kind: &'static str,
    rows: Vec<InsertRow<'a>>,
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    json: &'a SnapshotRow,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponseBody {
    #[serde(default)]
    insert_errors: Vec<InsertErrors>,
}

#[derive(Debug, Deserialize)]
struct InsertErrors {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorProto {
    fn text(&self) -> String {
        match (self.message.as_deref(), self.reason.as_deref()) {
            (Some(m), _) if !m.is_empty() => m.to_string(),
            (_, Some(r)) if !r.is_empty() => r.to_string(),
            _ => "unknown error".to_string(),
        }
    }
}

/// Streams rows into a `BigQuery` table.
///
/// A token is obtained per call, so nothing is held between loads.
#[derive(Debug, Clone)]
pub struct BigQueryRowSink {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenProvider,
}

impl BigQueryRowSink {
    /// Creates a sink against `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: TokenProvider) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn insert_all_url(&self, table: &TableRef) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            self.base_url, table.project_id, table.dataset_id, table.table_id
        )
    }
}

fn request_body(rows: &[SnapshotRow]) -> InsertAllRequestBody<'_> {
    InsertAllRequestBody {
        kind: "bigquery#tableDataInsertAllRequest",
        rows: rows.iter().map(|json| InsertRow { json }).collect(),
    }
}

fn decode_response(body: &str) -> Result<InsertAllResponse, SinkError> {
    let decoded: InsertAllResponseBody =
        serde_json::from_str(body).map_err(|e| SinkError::Decode(e.to_string()))?;

    let mut response = InsertAllResponse::ok();
    for entry in decoded.insert_errors {
        if entry.errors.is_empty() {
            response.add_error(entry.index, "unknown error");
        }
        for error in &entry.errors {
            response.add_error(entry.index, error.text());
        }
    }
    Ok(response)
}

impl RowSink for BigQueryRowSink {
    fn insert_all<'a>(
        &'a self,
        table: &'a TableRef,
        rows: Vec<SnapshotRow>,
    ) -> BoxFuture<'a, Result<InsertAllResponse, SinkError>> {
        Box::pin(async move {
            let token = self.tokens.access_token(&self.http).await?;

            let response = self
                .http
                .post(self.insert_all_url(table))
                .bearer_auth(token)
                .json(&request_body(&rows))
                .send()
                .await
                .map_err(|e| SinkError::Request(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| SinkError::Request(e.to_string()))?;

            if !status.is_success() {
                return Err(SinkError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            decode_response(&body)
        })
    }
}
