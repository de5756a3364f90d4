//! Error types for protocol encoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame was not valid JSON for the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An argument was missing or had the wrong type.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
