//! Database connection module for `ClickHouse`.
//!
//! Used when rows are loaded into `ClickHouse` instead of `BigQuery`. The target
//! database is taken from the dataset id at insert time; the configured database
//! only applies to ad-hoc queries such as [`Database::ping`].

use anyhow::{Context, Result};
use clickhouse::Client;
use std::sync::Arc;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `ClickHouse` database URL (e.g., <http://localhost:8123>)
    pub url: String,
    /// Database name to use
    pub database: String,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: String,
}

impl DatabaseConfig {
    /// Load database configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `STOREWATCH_DB_URL`: Database URL (default: <http://localhost:8123>)
    /// - `STOREWATCH_DB_NAME`: Database name (default: "default")
    /// - `STOREWATCH_DB_USER`: Database user (default: "default")
    /// - `STOREWATCH_DB_PASSWORD`: Database password (default: empty)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            url: lookup("STOREWATCH_DB_URL").unwrap_or_else(|| "http://localhost:8123".to_string()),
            database: lookup("STOREWATCH_DB_NAME").unwrap_or_else(|| "default".to_string()),
            user: lookup("STOREWATCH_DB_USER").unwrap_or_else(|| "default".to_string()),
            password: lookup("STOREWATCH_DB_PASSWORD").unwrap_or_default(),
        }
    }
}

/// Database client wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    client: Arc<Client>,
}

impl Database {
    /// Create a new database client from configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// # use api::db::{Database, DatabaseConfig};
    /// let config = DatabaseConfig::from_env();
    /// let db = Database::new(&config);
    /// ```
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying `ClickHouse` client.
    #[must_use]
    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    /// Test database connectivity by executing a simple query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached or the query fails.
    pub async fn ping(&self) -> Result<()> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("Failed to ping database")?;
        Ok(())
    }
}
