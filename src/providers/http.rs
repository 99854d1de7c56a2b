//! Shared HTTP plumbing for the vendor backends.

use crate::error::{Result, VoxturnError};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Longest slice of an error body worth quoting in a notice.
const ERROR_BODY_LIMIT: usize = 200;

/// One `reqwest` client shared by every backend, bounded by the provider timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxturnError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `request`, turning transport failures and non-2xx statuses into errors.
    #[instrument(level = "debug", skip(self, request))]
    pub async fn send(
        &self,
        provider: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| self.map_error(provider, e))?;

        let status = response.status();
        debug!(provider, %status, "provider responded");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        Err(VoxturnError::upstream(
            provider,
            format!("HTTP {status}: {}", snippet.trim()),
        ))
    }

    /// Send `request` and decode a JSON body.
    pub async fn json<T: DeserializeOwned>(
        &self,
        provider: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let bytes = self
            .send(provider, request)
            .await?
            .bytes()
            .await
            .map_err(|e| self.map_error(provider, e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VoxturnError::upstream(provider, format!("unexpected response: {e}")))
    }

    pub fn map_error(&self, provider: &str, error: reqwest::Error) -> VoxturnError {
        if error.is_timeout() {
            VoxturnError::Timeout {
                provider: provider.to_string(),
                after_secs: self.timeout.as_secs(),
            }
        } else {
            VoxturnError::upstream(provider, error.to_string())
        }
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
