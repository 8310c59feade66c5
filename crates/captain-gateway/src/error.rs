//! Error types for gateway operations.

use thiserror::Error;

/// Errors that can occur while talking to the captain controller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The platform's own concurrency lock rejected the request
    /// (HTTP 429). Expected to clear if the caller waits and retries.
    #[error("platform rate limited the request: {0}")]
    RateLimited(String),

    /// Transport-level failure from the HTTP client.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform answered with a non-ok status envelope.
    #[error("platform rejected the operation (status {status}): {description}")]
    Rejected {
        /// Numeric status code from the response envelope.
        status: i64,
        /// Human-readable description from the response envelope.
        description: String,
    },

    /// The response envelope was missing an expected payload.
    #[error("unexpected response shape: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Whether this is a connectivity-level transport failure, as
    /// opposed to a transport error raised while decoding or building
    /// a request. Only connectivity failures are worth retrying.
    pub fn is_connectivity(&self) -> bool {
        match self {
            GatewayError::Transport(inner) => inner.is_connect() || inner.is_timeout(),
            _ => false,
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
