//! Query parameter validation.

use std::borrow::Cow;

use crate::error::{UpdateError, UpdateResult};

/// Query parameter carrying the new IP.
pub const IP_PARAM: &str = "ip";

/// Query parameter carrying the policy alias.
pub const HOSTNAME_PARAM: &str = "hostname";

/// A validated update request.
///
/// Values are taken verbatim; an empty value is accepted, only absence is
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyUpdateRequest {
    pub ip: String,
    pub policy_alias: String,
}

/// Build a [`PolicyUpdateRequest`] from a raw query string (without `?`).
pub fn extract_request(query: Option<&str>) -> UpdateResult<PolicyUpdateRequest> {
    let query = query.unwrap_or("");

    let ip = first_param(query, IP_PARAM)
        .ok_or(UpdateError::MissingParameter { name: IP_PARAM })?;
    let policy_alias = first_param(query, HOSTNAME_PARAM)
        .ok_or(UpdateError::MissingParameter {
            name: HOSTNAME_PARAM,
        })?;

    Ok(PolicyUpdateRequest { ip, policy_alias })
}

/// First value of `name` in a form-urlencoded query.
fn first_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| Cow::into_owned(value))
}
