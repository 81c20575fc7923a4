//! HTTP client utilities.
//!
//! Provides a shared HTTP client for pricing-feed fetches, availability
//! probes, and the gateway client.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{ChansyncError, Result};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("chansync/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ChansyncError::Network(e.to_string()))
}

/// Get or create a default HTTP client.
pub fn default_client() -> Result<Client> {
    build_client(DEFAULT_TIMEOUT)
}

/// Fetch a URL body as text.
///
/// Pricing feeds are fetched as plain text and handed to the normalizer,
/// which owns all parsing tolerance.
///
/// # Errors
///
/// Returns error on network failure or a non-success status.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ChansyncError::Timeout(DEFAULT_TIMEOUT.as_secs())
        } else {
            ChansyncError::Network(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(ChansyncError::Network(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    response
        .text()
        .await
        .map_err(|e| ChansyncError::Network(e.to_string()))
}

/// Fetch JSON from a URL.
///
/// # Errors
///
/// Returns error on network failure or JSON parse failure.
pub async fn fetch_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ChansyncError::Timeout(DEFAULT_TIMEOUT.as_secs())
        } else {
            ChansyncError::Network(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(ChansyncError::Network(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ChansyncError::ParseResponse(e.to_string()))
}
