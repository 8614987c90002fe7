//! Client error types.

use thiserror::Error;

use crate::credentials::KeyError;

/// Status reported when no HTTP response was received.
pub const NO_RESPONSE_STATUS: u16 = 0;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, TLS, DNS or timeout failure before any HTTP response.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Non-200 status received from the exchange, or a response whose body
    /// could not be read after the status arrived.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Method name that cannot form a valid endpoint URL.
    #[error("Invalid method name: {0:?}")]
    InvalidMethod(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Credentials error: {0}")]
    Credentials(#[from] KeyError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Successful response whose body does not match the expected shape.
    #[error("Unexpected response for {method}: {reason}")]
    Decode { method: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status associated with the error.
    ///
    /// Transport failures report [`NO_RESPONSE_STATUS`]; errors raised before
    /// dispatch report `None`.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { .. } => Some(NO_RESPONSE_STATUS),
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(self, ClientError::Http { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
