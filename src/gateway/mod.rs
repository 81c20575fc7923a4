//! Outbound client for the gateway's channel-management API.
//!
//! Pure pass-through: no domain logic lives here. Every call authenticates
//! with the gateway admin token and surfaces the gateway's standard
//! `{ success, message, data }` response envelope.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::models::ChannelRequest;
use crate::error::{ChansyncError, Result};

/// Header carrying the gateway admin user id.
const USER_HEADER: &str = "New-Api-User";

// =============================================================================
// Wire Models
// =============================================================================

/// Standard gateway response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the envelope, turning `success=false` into an error.
    ///
    /// # Errors
    /// Returns [`ChansyncError::Gateway`] when the gateway reports failure.
    pub fn into_result(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ChansyncError::Gateway(
                self.message.unwrap_or_else(|| "unspecified failure".to_string()),
            ))
        }
    }
}

/// A channel as returned by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub channel_type: i64,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub models: String,
    #[serde(default)]
    pub group: String,
    /// Only present when fetching a single channel.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_mapping: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// One page of the gateway channel listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelPage {
    #[serde(default)]
    pub items: Vec<Channel>,
    #[serde(default)]
    pub total: i64,
}

/// Partial-field channel update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChannelRequest {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_mapping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

/// Result of the gateway's own channel connectivity test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestChannelResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Response time in seconds.
    #[serde(default)]
    pub time: f64,
}

// =============================================================================
// Client
// =============================================================================

/// Gateway API client.
pub struct GatewayClient {
    client: Client,
    base_url: String,
    token: String,
    user_id: Option<String>,
}

impl GatewayClient {
    /// Create a client for the given gateway.
    #[must_use]
    pub fn new(client: Client, base_url: &str, token: &str, user_id: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            user_id: user_id.map(ToString::to_string),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token);
        if let Some(user_id) = &self.user_id {
            builder = builder.header(USER_HEADER, user_id);
        }
        builder
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| ChansyncError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChansyncError::Network(format!(
                "HTTP {} from gateway",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChansyncError::ParseResponse(e.to_string()))
    }

    /// List channels (paged).
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn list_channels(&self, page: u32, page_size: u32) -> Result<ApiResponse<ChannelPage>> {
        let builder = self
            .request(
                reqwest::Method::GET,
                &format!("/api/channel/?p={page}&page_size={page_size}"),
            );
        self.send(builder).await
    }

    /// Fetch one channel with its detail-only fields.
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn get_channel(&self, id: i64) -> Result<ApiResponse<Channel>> {
        let builder = self.request(reqwest::Method::GET, &format!("/api/channel/{id}"));
        self.send(builder).await
    }

    /// Create a channel, wrapping the request in the single-mode envelope.
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn add_channel(
        &self,
        channel: &ChannelRequest,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let body = json!({
            "mode": "single",
            "channel": channel,
        });
        let builder = self.request(reqwest::Method::POST, "/api/channel/").json(&body);
        self.send(builder).await
    }

    /// Update a channel with partial fields.
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn update_channel(
        &self,
        update: &UpdateChannelRequest,
    ) -> Result<ApiResponse<serde_json::Value>> {
        let builder = self.request(reqwest::Method::PUT, "/api/channel/").json(update);
        self.send(builder).await
    }

    /// Delete one channel.
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn delete_channel(&self, id: i64) -> Result<ApiResponse<serde_json::Value>> {
        let builder = self.request(reqwest::Method::DELETE, &format!("/api/channel/{id}"));
        self.send(builder).await
    }

    /// Delete a batch of channels by id; data is the deleted count.
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn delete_channels(&self, ids: &[i64]) -> Result<ApiResponse<i64>> {
        let body = json!({ "ids": ids });
        let builder = self
            .request(reqwest::Method::POST, "/api/channel/batch")
            .json(&body);
        self.send(builder).await
    }

    /// Ask the gateway to run its own connectivity test for a channel.
    ///
    /// # Errors
    /// Returns an error on network or decode failure.
    pub async fn test_channel(&self, id: i64, model: Option<&str>) -> Result<TestChannelResponse> {
        let path = match model {
            Some(model) => format!("/api/channel/test/{id}?model={model}"),
            None => format!("/api/channel/test/{id}"),
        };
        let builder = self.request(reqwest::Method::GET, &path);
        self.send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_unwraps_data() {
        let response = ApiResponse {
            success: true,
            message: None,
            data: Some(7),
        };
        assert_eq!(response.into_result().unwrap(), Some(7));
    }

    #[test]
    fn envelope_failure_surfaces_message() {
        let response: ApiResponse<i64> = ApiResponse {
            success: false,
            message: Some("no such channel".into()),
            data: None,
        };
        match response.into_result() {
            Err(ChansyncError::Gateway(message)) => assert_eq!(message, "no such channel"),
            other => panic!("expected gateway error, got {other:?}"),
        }
    }

    #[test]
    fn update_request_skips_absent_fields() {
        let update = UpdateChannelRequest {
            id: 3,
            models: Some("gpt-4".into()),
            ..UpdateChannelRequest::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["models"], "gpt-4");
        assert!(value.get("priority").is_none());
        assert!(value.get("name").is_none());
    }

    #[test]
    fn channel_tolerates_missing_detail_fields() {
        let channel: Channel =
            serde_json::from_str(r#"{"id":1,"name":"vip-P100","models":"gpt-4"}"#).unwrap();
        assert_eq!(channel.id, 1);
        assert!(channel.base_url.is_none());
        assert!(channel.key.is_none());
    }
}
