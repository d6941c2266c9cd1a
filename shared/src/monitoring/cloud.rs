//! Cloud Monitoring v3 REST backend.

use super::{
    BoxFuture, ListTimeSeriesRequest, MonitoringBackend, MonitoringError, TimeSeriesPage,
    TimeSeriesSource,
};
use crate::auth::TokenProvider;

/// Default Cloud Monitoring API endpoint.
pub const DEFAULT_MONITORING_URL: &str = "https://monitoring.googleapis.com";

/// Talks to `GET /v3/{name}/timeSeries`.
///
/// Each call to [`MonitoringBackend::connect`] fetches a fresh access token;
/// the resulting session carries it until dropped.
#[derive(Debug, Clone)]
pub struct CloudMonitoringBackend {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenProvider,
}

impl CloudMonitoringBackend {
    /// Creates a backend against `base_url` using `http` for all calls.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: TokenProvider) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

impl MonitoringBackend for CloudMonitoringBackend {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn TimeSeriesSource>, MonitoringError>> {
        Box::pin(async move {
            let token = self.tokens.access_token(&self.http).await?;
            Ok(Box::new(CloudMonitoringSession {
                http: self.http.clone(),
                base_url: self.base_url.clone(),
                token,
            }) as Box<dyn TimeSeriesSource>)
        })
    }
}

struct CloudMonitoringSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

fn time_series_url(base_url: &str, name: &str) -> String {
    format!("{base_url}/v3/{name}/timeSeries")
}

fn decode_page(body: &str) -> Result<TimeSeriesPage, MonitoringError> {
    serde_json::from_str(body).map_err(|e| MonitoringError::Decode(e.to_string()))
}

impl TimeSeriesSource for CloudMonitoringSession {
    fn list_page<'a>(
        &'a self,
        request: &'a ListTimeSeriesRequest,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<TimeSeriesPage, MonitoringError>> {
        Box::pin(async move {
            let response = self
                .http
                .get(time_series_url(&self.base_url, &request.name))
                .bearer_auth(&self.token)
                .query(&request.query_pairs(page_token))
                .send()
                .await
                .map_err(|e| MonitoringError::Request(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| MonitoringError::Request(e.to_string()))?;

            if !status.is_success() {
                return Err(MonitoringError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let page = decode_page(&body)?;
            tracing::debug!(
                series = page.time_series.len(),
                has_next = page.next_page_token.as_deref().is_some_and(|t| !t.is_empty()),
                "Fetched time series page"
            );
            Ok(page)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_url() {
        let backend = CloudMonitoringBackend::new(
            reqwest::Client::new(),
            "https://monitoring.googleapis.com/",
            TokenProvider::Static("t".to_string()),
        );
        assert_eq!(
            time_series_url(&backend.base_url, "projects/p1"),
            "https://monitoring.googleapis.com/v3/projects/p1/timeSeries"
        );
    }

    #[test]
    fn test_decode_page_errors() {
        assert!(matches!(decode_page("<html>"), Err(MonitoringError::Decode(_))));
        assert!(decode_page(r#"{"unit": "By"}"#).unwrap().time_series.is_empty());
    }

    #[tokio::test]
    async fn test_connect_with_static_token() {
        let backend = CloudMonitoringBackend::new(
            reqwest::Client::new(),
            DEFAULT_MONITORING_URL,
            TokenProvider::Static("t".to_string()),
        );
        assert!(backend.connect().await.is_ok());
    }
}
