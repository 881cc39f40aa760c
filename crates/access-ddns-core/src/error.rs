//! Error types for the update workflow and the Cloudflare client.

/// Body returned for every failure that is not classified below.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Classified failures of a policy update.
///
/// Each variant decides its HTTP status and the message shown to the caller
/// at the point of detection; the dispatcher only renders them.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// No Authorization header (or an empty one).
    #[error("API token missing.")]
    Unauthenticated,

    /// Header present but the payload could not be decoded into a token.
    #[error("Invalid API key or token.")]
    InvalidCredential,

    /// Token verified but not in the `active` state.
    #[error("This API Token is {status}")]
    InactiveCredential { status: String },

    /// A required query parameter is absent.
    #[error("The \"{name}\" parameter is required and cannot be empty.")]
    MissingParameter { name: &'static str },

    /// Alias resolution and listing produced no policy.
    #[error("No policies found! You must first manually create the policy.")]
    PolicyNotFound,

    /// Anything else that went wrong talking to the remote service.
    #[error("remote service error: {message}")]
    RemoteService { message: String },
}

impl UpdateError {
    /// HTTP status code for the response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::InvalidCredential => 401,
            Self::InactiveCredential { .. } => 401,

            Self::MissingParameter { .. } => 422,

            Self::PolicyNotFound => 400,

            Self::RemoteService { .. } => 500,
        }
    }

    /// Body sent to the caller. Internal detail never leaves the process.
    pub fn public_message(&self) -> String {
        match self {
            Self::RemoteService { .. } => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this failure was classified at detection time.
    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::RemoteService { .. })
    }
}

impl From<ApiError> for UpdateError {
    fn from(err: ApiError) -> Self {
        Self::RemoteService {
            message: err.to_string(),
        }
    }
}

/// Result type for the update workflow.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors from the Cloudflare API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Token rejected by the API (401/403).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Resource not found (404).
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Envelope reported `success: false`.
    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },

    /// Unexpected HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// Body could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Client could not be built.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for client operations.
pub type ApiResult<T> = Result<T, ApiError>;
