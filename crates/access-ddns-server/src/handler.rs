//! The update endpoint and the mapping from outcomes to responses.

use std::net::SocketAddr;

use access_ddns_core::{
    extract_credential, extract_request, UpdateError, UpdateOutcome, UpdateResult,
};
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{AUTHORIZATION, REFERER, USER_AGENT};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::app::AppState;

/// Request details logged for every call. Never includes the credential.
#[derive(Debug)]
struct RequestMetadata<'a> {
    requester_ip: String,
    ray_id: &'a str,
    user_agent: &'a str,
    referer: &'a str,
    method: &'a Method,
    uri: &'a Uri,
    body: std::borrow::Cow<'a, str>,
}

impl<'a> RequestMetadata<'a> {
    fn capture(
        peer: Option<SocketAddr>,
        method: &'a Method,
        uri: &'a Uri,
        headers: &'a HeaderMap,
        body: &'a [u8],
    ) -> Self {
        let requester_ip = header_str(headers, "cf-connecting-ip")
            .or_else(|| {
                header_str(headers, "x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
            })
            .map(String::from)
            .or_else(|| peer.map(|p| p.ip().to_string()))
            .unwrap_or_else(|| "-".to_string());

        Self {
            requester_ip,
            ray_id: header_str(headers, "cf-ray").unwrap_or("-"),
            user_agent: header_str(headers, USER_AGENT.as_str()).unwrap_or("-"),
            referer: header_str(headers, REFERER.as_str()).unwrap_or("-"),
            method,
            uri,
            body: String::from_utf8_lossy(body),
        }
    }

    fn log(&self) {
        info!(
            requester_ip = %self.requester_ip,
            ray_id = %self.ray_id,
            user_agent = %self.user_agent,
            referer = %self.referer,
            method = %self.method,
            uri = %self.uri,
            body = %self.body,
            "update request"
        );
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Handles `/update` and every other path, whatever the method.
pub async fn update_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    RequestMetadata::capture(peer.map(|ConnectInfo(addr)| addr), &method, &uri, &headers, &body)
        .log();

    render(process(&state, &uri, &headers).await)
}

async fn process(state: &AppState, uri: &Uri, headers: &HeaderMap) -> UpdateResult<UpdateOutcome> {
    let authorization = headers
        .get(AUTHORIZATION)
        .map(|v| v.to_str().map_err(|_| UpdateError::InvalidCredential))
        .transpose()?;

    let token = extract_credential(authorization)?;
    let request = extract_request(uri.query())?;

    state.updater().apply(token, &request).await
}

/// Liveness check.
pub async fn health() -> &'static str {
    "OK"
}

/// Total mapping from workflow result to HTTP response.
pub fn render(result: UpdateResult<UpdateOutcome>) -> Response {
    match result {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(err) => UpdateFailure(err).into_response(),
    }
}

/// Error response wrapper; body is plain text.
#[derive(Debug)]
pub struct UpdateFailure(pub UpdateError);

impl IntoResponse for UpdateFailure {
    fn into_response(self) -> Response {
        let err = self.0;

        if err.is_classified() {
            info!(status = err.status_code(), "Error updating policy: {}", err);
        } else {
            error!(error = %err, "Error updating policy");
        }

        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, err.public_message()).into_response()
    }
}
