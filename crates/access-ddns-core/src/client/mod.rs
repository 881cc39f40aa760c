//! Cloudflare API client for Access policies and Workers KV.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::credential::ApiToken;
use crate::error::{ApiError, ApiResult};
use crate::policy::{AccessPolicy, PolicyPatch};
use crate::types::{ApiConfig, PolicyFilter, TokenStatus};

mod http;

use http::{HttpBackend, Lookup};

const USER_AGENT_VALUE: &str = concat!("access-ddns/", env!("CARGO_PKG_VERSION"));

/// Remote operations the policy updater depends on.
#[async_trait]
pub trait AccessApi: Send + Sync {
    /// Check the token the client was built with.
    async fn verify_token(&self) -> ApiResult<TokenStatus>;

    /// List Access policies of an account.
    async fn list_policies(
        &self,
        account_id: &str,
        filter: &PolicyFilter,
    ) -> ApiResult<Vec<AccessPolicy>>;

    /// Replace name, decision and include of a policy.
    async fn update_policy(
        &self,
        account_id: &str,
        policy_id: &str,
        patch: &PolicyPatch,
    ) -> ApiResult<AccessPolicy>;
}

/// Shared connection pool; hands out clients bound to a token.
///
/// Cloning is cheap, the underlying `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct ApiConnector {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiConnector {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ApiError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let base_url = Url::parse(config.url.trim_end_matches('/')).map_err(|e| {
            ApiError::Config {
                message: format!("invalid API URL {:?}: {}", config.url, e),
            }
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::Config {
                message: format!("invalid API URL {:?}: not a base URL", config.url),
            });
        }

        Ok(Self { client, base_url })
    }

    /// Client authenticating with `token`.
    pub fn connect(&self, token: ApiToken) -> CloudflareClient {
        CloudflareClient {
            http: HttpBackend {
                client: self.client.clone(),
                base_url: self.base_url.clone(),
                token,
            },
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }
}

/// Cloudflare v4 API client bound to one API token.
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    http: HttpBackend,
}

impl CloudflareClient {
    pub fn new(config: &ApiConfig, token: ApiToken) -> ApiResult<Self> {
        Ok(ApiConnector::new(config)?.connect(token))
    }

    /// Read a Workers KV value; `None` when the key does not exist.
    pub async fn kv_get(
        &self,
        account_id: &str,
        namespace_id: &str,
        key: &str,
    ) -> ApiResult<Option<String>> {
        let url = self.http.endpoint(&[
            "accounts",
            account_id,
            "storage",
            "kv",
            "namespaces",
            namespace_id,
            "values",
            key,
        ])?;
        debug!(namespace = %namespace_id, key = %key, "reading kv value");

        match self.http.fetch_text_optional(url).await? {
            Lookup::Missing => Ok(None),
            Lookup::Found(value) => Ok(Some(value)),
        }
    }

    fn policies_url(&self, account_id: &str) -> ApiResult<Url> {
        self.http
            .endpoint(&["accounts", account_id, "access", "policies"])
    }
}

#[async_trait]
impl AccessApi for CloudflareClient {
    async fn verify_token(&self) -> ApiResult<TokenStatus> {
        let url = self.http.endpoint(&["user", "tokens", "verify"])?;
        debug!("verifying api token");

        self.http
            .call(Method::GET, url, None)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse {
                message: "token verification returned no result".to_string(),
            })
    }

    async fn list_policies(
        &self,
        account_id: &str,
        filter: &PolicyFilter,
    ) -> ApiResult<Vec<AccessPolicy>> {
        let mut url = self.policies_url(account_id)?;
        if let Some(id) = &filter.id {
            url.query_pairs_mut().append_pair("id", id);
        }
        debug!(account = %account_id, filter = ?filter, "listing access policies");

        let mut policies: Vec<AccessPolicy> = self
            .http
            .call(Method::GET, url, None)
            .await?
            .unwrap_or_default();

        if let Some(id) = &filter.id {
            policies.retain(|p| &p.id == id);
        }

        Ok(policies)
    }

    async fn update_policy(
        &self,
        account_id: &str,
        policy_id: &str,
        patch: &PolicyPatch,
    ) -> ApiResult<AccessPolicy> {
        let url = self
            .http
            .endpoint(&["accounts", account_id, "access", "policies", policy_id])?;
        debug!(account = %account_id, policy = %policy_id, "updating access policy");

        let body = serde_json::to_value(patch).map_err(|e| ApiError::InvalidResponse {
            message: format!("failed to encode policy update: {}", e),
        })?;

        self.http
            .call(Method::PUT, url, Some(&body))
            .await?
            .ok_or_else(|| ApiError::InvalidResponse {
                message: "policy update returned no result".to_string(),
            })
    }
}
