use serde_json::Value;
use thiserror::Error;

/// Result delivered by every dispatch: `Ok(value)` on success, `Err(error)` on failure.
pub type ApiResult = Result<Value, ApiError>;

/// Errors surfaced through the failure branch of [`ApiResult`].
///
/// Transport failures are always values. Contract violations (a missing
/// required argument, a coroutine-only call made outside a coroutine) are
/// panics and never show up here.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ApiError {
    /// Network-level failure (connect, TLS, timeout, pool shut down)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: Value },

    /// Response body was not valid JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The cancellation token scoping this call was cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// A function run through `run_scoped` panicked
    #[error("Scoped task panicked: {0}")]
    TaskPanicked(String),

    /// The coroutine for a scoped task could not be started
    #[error("Failed to start scoped task: {0}")]
    TaskSpawn(String),

    /// HTTP verb outside GET/POST/PUT/PATCH/DELETE
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// No endpoint with this operation id in the catalog
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Base URL and path could not be joined into a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// OpenAPI document could not be turned into an endpoint table
    #[error("OpenAPI error: {0}")]
    Spec(String),
}

impl ApiError {
    /// Whether a retry policy may issue another attempt after this error.
    ///
    /// Transport failures, `429 Too Many Requests` and `5xx` responses are
    /// retried; everything else is final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status code, when the failure came from a store response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
