//! Error types for the client.

use homegate_protocol::{ApiError, ErrorCode, ProtocolError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with an API error.
    #[error("api error: {0}")]
    Api(ApiError),

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server returned neither data nor errors, or data of the wrong shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// No session token is held.
    #[error("not logged in")]
    NotLoggedIn,

    /// The configured server origin is unusable.
    #[error("invalid server origin: {0}")]
    InvalidOrigin(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Timeout => true,
            ClientError::Api(error) => error.code() == ErrorCode::InternalServerError,
            _ => false,
        }
    }

    /// Returns true if the server refused the request for lack of a valid
    /// session.
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            ClientError::NotLoggedIn => true,
            ClientError::Api(error) => error.code() == ErrorCode::Unauthenticated,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Protocol(ProtocolError::Malformed(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ClientError::transport_retryable("connection reset").is_retryable());
        assert!(!ClientError::transport_fatal("bad certificate").is_retryable());
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Api(ApiError::new(ErrorCode::InternalServerError, "boom")).is_retryable());
        assert!(!ClientError::Api(ApiError::new(ErrorCode::BadUserInput, "no")).is_retryable());
        assert!(!ClientError::NotLoggedIn.is_retryable());
    }

    #[test]
    fn unauthenticated_errors() {
        assert!(ClientError::NotLoggedIn.is_unauthenticated());
        assert!(ClientError::Api(ApiError::new(ErrorCode::Unauthenticated, "log in")).is_unauthenticated());
        assert!(!ClientError::Timeout.is_unauthenticated());
    }

    #[test]
    fn error_display() {
        assert_eq!(ClientError::NotLoggedIn.to_string(), "not logged in");
        let err = ClientError::Api(ApiError::new(ErrorCode::NotFound, "no such device"));
        assert!(err.to_string().contains("no such device"));
    }
}
