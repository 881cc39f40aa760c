//! Credential extraction from the `Authorization` header.
//!
//! Routers send HTTP Basic style credentials, `Basic base64(label:token)`.
//! The label (usually an email address) is ignored; the part after the first
//! colon is the Cloudflare API token used for every remote call.

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use crate::error::{UpdateError, UpdateResult};

/// Base64 engine as lenient as a browser `atob`: padding optional, trailing
/// bits ignored.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Caller-supplied Cloudflare API token.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// Extract the API token from an `Authorization` header value.
///
/// The header is `<scheme> <payload>`; the scheme is not checked. The decoded
/// payload must contain a colon and no ASCII control characters.
pub fn extract_credential(header: Option<&str>) -> UpdateResult<ApiToken> {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => return Err(UpdateError::Unauthenticated),
    };

    let mut parts = header.split(' ');
    parts.next();
    let payload = parts.next().ok_or(UpdateError::InvalidCredential)?;

    let decoded = decode_payload(payload)?;

    if decoded.chars().any(|c| c.is_ascii_control()) {
        return Err(UpdateError::InvalidCredential);
    }

    let (_label, secret) = decoded
        .split_once(':')
        .ok_or(UpdateError::InvalidCredential)?;

    Ok(ApiToken::new(secret))
}

/// Decode base64 into text, one code point per byte.
fn decode_payload(payload: &str) -> UpdateResult<String> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = LENIENT_STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| UpdateError::InvalidCredential)?;

    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}
