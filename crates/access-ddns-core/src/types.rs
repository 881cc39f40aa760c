//! API response types and client configuration.

use serde::{Deserialize, Serialize};

/// Standard Cloudflare v4 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,

    #[serde(default)]
    pub errors: Vec<ApiMessage>,

    #[serde(default)]
    pub messages: Vec<ApiMessage>,

    pub result: Option<T>,
}

/// Entry of an envelope's `errors` or `messages` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}

/// Result of `GET /user/tokens/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    #[serde(default)]
    pub id: String,

    /// `active`, `disabled` or `expired`.
    pub status: String,
}

impl TokenStatus {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Filter for listing Access policies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFilter {
    /// Policy id resolved from the alias table.
    pub id: Option<String>,
}

impl PolicyFilter {
    pub fn by_id(id: Option<String>) -> Self {
        Self { id }
    }
}

/// Cloudflare API client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL of the v4 API.
    pub url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Public Cloudflare v4 API.
pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `CLOUDFLARE_API_URL` | API base URL |
    /// | `ACCESS_DDNS_TIMEOUT` | Request timeout in seconds |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("CLOUDFLARE_API_URL").unwrap_or_else(|_| default_api_url()),
            timeout_secs: std::env::var("ACCESS_DDNS_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
        }
    }

    /// Set the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
