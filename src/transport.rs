//! HTTP transport wrapper with explicit failure signals
//!
//! Wraps a single reqwest GET in a deadline and converts every failure mode
//! into a `TransportError` variant, so downstream classification never has
//! to guess from error types whether a response was actually received.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure modes of one transport call, in the order they can occur
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (connection refused, DNS, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// The deadline elapsed before a response arrived
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {status_text}")]
    HttpStatus {
        /// Numeric status code
        status: u16,
        /// Canonical reason phrase, empty if unknown
        status_text: String,
    },

    /// The response body did not match the expected shape
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Performs a GET with a hard deadline, returning the raw response.
///
/// The status is not checked here; callers that want non-2xx statuses
/// surfaced as errors should use [`fetch_json`].
pub async fn fetch_with_timeout(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<reqwest::Response, TransportError> {
    let request = client
        .get(url)
        .header("Accept", "application/json")
        .send();

    match tokio::time::timeout(timeout, request).await {
        Err(_) => Err(TransportError::Timeout(timeout)),
        Ok(Err(err)) if err.is_timeout() => Err(TransportError::Timeout(timeout)),
        Ok(Err(err)) => Err(TransportError::Network(err.to_string())),
        Ok(Ok(response)) => Ok(response),
    }
}

/// Performs a GET with a deadline, checks the status, and decodes the JSON body
pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<T, TransportError> {
    let response = fetch_with_timeout(client, url, timeout).await?;
    let status = response.status();

    if !status.is_success() {
        return Err(TransportError::HttpStatus {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
        });
    }

    let text = response
        .text()
        .await
        .map_err(|err| TransportError::Network(err.to_string()))?;

    Ok(serde_json::from_str(&text)?)
}
