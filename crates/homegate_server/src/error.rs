//! Error types for the API server.

use crate::gateway::GatewayError;
use crate::gate::AUTHENTICATION_REQUIRED;
use homegate_protocol::{ApiError, ErrorCode, ProtocolError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Message returned for every failed login, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Errors that can occur in the API server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Missing or invalid startup configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wrong password on login.
    #[error("{}", INVALID_CREDENTIALS)]
    AuthenticationFailed,

    /// A gated field was called without a valid session.
    #[error("{}", AUTHENTICATION_REQUIRED)]
    Unauthenticated,

    /// Invalid request format or arguments.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown device.
    #[error("device not found: {0}")]
    NotFound(String),

    /// Device gateway failure.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::AuthenticationFailed
                | ServerError::Unauthenticated
                | ServerError::InvalidRequest(_)
                | ServerError::NotFound(_)
        ) || matches!(self, ServerError::Gateway(GatewayError::UnknownDevice(_)))
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Converts to the error entry rendered in API responses.
    ///
    /// Server-side failures are reported with a generic message; the
    /// detail only goes to the log.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            ServerError::AuthenticationFailed | ServerError::Unauthenticated => {
                ApiError::new(ErrorCode::Unauthenticated, self.to_string())
            }
            ServerError::InvalidRequest(_) => ApiError::new(ErrorCode::BadUserInput, self.to_string()),
            ServerError::NotFound(_) | ServerError::Gateway(GatewayError::UnknownDevice(_)) => {
                ApiError::new(ErrorCode::NotFound, self.to_string())
            }
            ServerError::Gateway(GatewayError::Unsupported { .. }) => {
                ApiError::new(ErrorCode::BadUserInput, self.to_string())
            }
            _ => ApiError::new(ErrorCode::InternalServerError, "internal server error"),
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Internal(format!("serialization failed: {err}"))
    }
}
