//! HTTP layer: status mapping and envelope decoding.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::credential::ApiToken;
use crate::error::{ApiError, ApiResult};
use crate::types::{ApiMessage, Envelope};

/// Outcome of a lookup where a 404 is an expected answer.
#[derive(Debug)]
pub(crate) enum Lookup {
    Missing,
    Found(String),
}

/// HTTP backend bound to one API token.
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) token: ApiToken,
}

impl HttpBackend {
    /// Base URL extended with percent-encoded path segments.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Config {
                message: format!("API base URL cannot carry a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode the `result` of the response envelope.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<Option<T>> {
        let response = self.request(method, url, body).await?;

        let envelope: Envelope<T> =
            response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse {
                    message: format!("failed to parse response envelope: {}", e),
                })?;

        if !envelope.success {
            return Err(envelope_error(&envelope.errors));
        }

        Ok(envelope.result)
    }

    /// Fetch a raw body; 404 => Missing.
    pub(crate) async fn fetch_text_optional(&self, url: Url) -> ApiResult<Lookup> {
        match self.request(Method::GET, url, None).await {
            Ok(response) => {
                let text = response.text().await.map_err(|e| ApiError::Network {
                    message: format!("failed to read response body: {}", e),
                })?;
                Ok(Lookup::Found(text))
            }
            Err(ApiError::NotFound { resource }) => {
                debug!(resource = %resource, "value not found");
                Ok(Lookup::Missing)
            }
            Err(e) => Err(e),
        }
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<reqwest::Response> {
        debug!(method = %method, path = %url.path(), "cloudflare api request");

        let resource = url.path().to_string();
        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token.as_str()));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        match status.as_u16() {
            200..=299 => Ok(response),

            401 | 403 => Err(ApiError::Unauthorized {
                message: error_summary(response).await,
            }),

            404 => Err(ApiError::NotFound { resource }),

            _ => Err(ApiError::Http {
                status: status.as_u16(),
                message: error_summary(response).await,
            }),
        }
    }
}

/// Readable summary of an error response: envelope errors if present,
/// otherwise the start of the body.
async fn error_summary(response: reqwest::Response) -> String {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(_) => return status_text(status),
    };

    if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(&body) {
        if !envelope.errors.is_empty() {
            return join_messages(&envelope.errors);
        }
    }

    if body.is_empty() {
        status_text(status)
    } else {
        body.chars().take(200).collect()
    }
}

fn envelope_error(errors: &[ApiMessage]) -> ApiError {
    match errors.first() {
        Some(first) => ApiError::Api {
            code: first.code,
            message: join_messages(errors),
        },
        None => ApiError::Api {
            code: 0,
            message: "request unsuccessful without error detail".to_string(),
        },
    }
}

fn join_messages(messages: &[ApiMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.code, m.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn status_text(status: StatusCode) -> String {
    status.to_string()
}
