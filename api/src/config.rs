//! Job and server configuration.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use crate::db::DatabaseConfig;
use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Where collected rows are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// `BigQuery` streaming inserts.
    #[default]
    BigQuery,
    /// `ClickHouse` native inserts.
    ClickHouse,
}

impl FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bigquery" => Ok(Self::BigQuery),
            "clickhouse" => Ok(Self::ClickHouse),
            other => bail!("unknown sink '{other}', expected 'bigquery' or 'clickhouse'"),
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BigQuery => write!(f, "bigquery"),
            Self::ClickHouse => write!(f, "clickhouse"),
        }
    }
}

/// Runtime configuration.
///
/// Configuration values can be set via environment variables:
/// - `GCP_PROJECT_ID`: Project to collect (required)
/// - `BQ_DATASET_ID`: Target dataset (default: "`gcs_storage_costs`")
/// - `BQ_TABLE_ID`: Target table (default: "`bucket_snapshots`")
/// - `STOREWATCH_SINK`: "bigquery" or "clickhouse" (default: "bigquery")
/// - `STOREWATCH_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `PORT`: The port to listen on (default: 8080)
/// - `GOOGLE_OAUTH_ACCESS_TOKEN`: Static bearer token; the metadata server is used when unset
/// - `STOREWATCH_MONITORING_URL`, `STOREWATCH_BIGQUERY_URL`: API endpoints
/// - `STOREWATCH_HTTP_TIMEOUT_SECS`: Request timeout (default: 30)
/// - `CLOUD_RUN_TASK_INDEX`, `CLOUD_RUN_TASK_ATTEMPT`: Set by Cloud Run Jobs, logged only
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Project to collect and owning project of the target table.
    pub project_id: String,
    /// Target dataset.
    pub dataset_id: String,
    /// Target table.
    pub table_id: String,
    /// Sink backend.
    pub sink: SinkKind,
    /// Static access token, if configured.
    pub access_token: Option<String>,
    /// Cloud Monitoring API base URL.
    pub monitoring_url: String,
    /// `BigQuery` API base URL.
    pub bigquery_url: String,
    /// Timeout applied to every outgoing request.
    pub http_timeout: Duration,
    /// Cloud Run task index.
    pub task_index: String,
    /// Cloud Run task attempt.
    pub task_attempt: String,
    /// `ClickHouse` connection, used when `sink` is `ClickHouse`.
    pub database: DatabaseConfig,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `GCP_PROJECT_ID` is missing or blank
    /// - `PORT` or `STOREWATCH_HTTP_TIMEOUT_SECS` is set but not a number
    /// - `STOREWATCH_SINK` names an unknown sink
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = lookup("PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("PORT must be a valid port number")?
            .unwrap_or(8080);

        let timeout_secs = lookup("STOREWATCH_HTTP_TIMEOUT_SECS")
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("STOREWATCH_HTTP_TIMEOUT_SECS must be a whole number of seconds")?
            .unwrap_or(30);

        let sink = lookup("STOREWATCH_SINK")
            .map(|s| s.parse::<SinkKind>())
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            host: var("STOREWATCH_HOST", "0.0.0.0"),
            port,
            project_id: var("GCP_PROJECT_ID", ""),
            dataset_id: var("BQ_DATASET_ID", "gcs_storage_costs"),
            table_id: var("BQ_TABLE_ID", "bucket_snapshots"),
            sink,
            access_token: lookup("GOOGLE_OAUTH_ACCESS_TOKEN"),
            monitoring_url: var(
                "STOREWATCH_MONITORING_URL",
                shared::monitoring::cloud::DEFAULT_MONITORING_URL,
            ),
            bigquery_url: var(
                "STOREWATCH_BIGQUERY_URL",
                shared::storage::bigquery_sink::DEFAULT_BIGQUERY_URL,
            ),
            http_timeout: Duration::from_secs(timeout_secs),
            task_index: var("CLOUD_RUN_TASK_INDEX", "0"),
            task_attempt: var("CLOUD_RUN_TASK_ATTEMPT", "0"),
            database: DatabaseConfig::from_lookup(&lookup),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the values that have no usable default.
    ///
    /// # Errors
    ///
    /// Returns an error if the project, dataset or table id is blank.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            bail!("GCP_PROJECT_ID environment variable must be set");
        }
        if self.dataset_id.trim().is_empty() || self.table_id.trim().is_empty() {
            bail!("BQ_DATASET_ID and BQ_TABLE_ID cannot be empty");
        }
        Ok(())
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}
