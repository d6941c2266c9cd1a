//! OAuth access tokens for the Google REST APIs.
//!
//! Tokens come either from configuration (useful locally, e.g. the output of
//! `gcloud auth print-access-token`) or from the metadata server available on
//! Cloud Run and Compute Engine.

use serde::Deserialize;
use thiserror::Error;

/// Default metadata server endpoint for the default service account token.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Errors that can occur while obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The metadata server could not be reached.
    #[error("metadata server request failed: {0}")]
    Request(String),

    /// The metadata server answered with a non-success status.
    #[error("metadata server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The token response could not be decoded.
    #[error("invalid token response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Source of bearer tokens for outgoing API calls.
#[derive(Debug, Clone)]
pub enum TokenProvider {
    /// A fixed token supplied by configuration.
    Static(String),
    /// Fetch a fresh token from the metadata server on every call.
    MetadataServer {
        /// Token endpoint URL.
        url: String,
    },
}

impl TokenProvider {
    /// Uses `token` when present and non-blank, the metadata server otherwise.
    #[must_use]
    pub fn from_optional(token: Option<String>) -> Self {
        match token {
            Some(t) if !t.trim().is_empty() => Self::Static(t.trim().to_string()),
            _ => Self::MetadataServer {
                url: METADATA_TOKEN_URL.to_string(),
            },
        }
    }

    /// Returns a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata server cannot be reached or its answer is unusable.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, AuthError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::MetadataServer { url } => {
                let response = http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| AuthError::Request(e.to_string()))?;

                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| AuthError::Request(e.to_string()))?;

                if !status.is_success() {
                    return Err(AuthError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }

                parse_metadata_token(&body)
            }
        }
    }
}

fn parse_metadata_token(body: &str) -> Result<String, AuthError> {
    let token: MetadataToken =
        serde_json::from_str(body).map_err(|e| AuthError::Decode(e.to_string()))?;
    Ok(token.access_token)
}
