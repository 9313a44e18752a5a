//! Error types for the display client

use thiserror::Error;

use crate::state::CloseReason;

/// Errors that can occur while pairing or talking to the queue server
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Server URL could not be parsed or turned into a WebSocket URL
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// Server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The pairing code expired before a staff member confirmed it
    #[error("pairing code {0} expired before it was confirmed")]
    PairingExpired(String),

    /// The session ended and will not reconnect
    #[error("display session closed: {0}")]
    Closed(CloseReason),
}

impl ClientError {
    /// Check if this error is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            ClientError::WebSocket(_) => true,
            ClientError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

/// Result type for display client operations
pub type ClientResult<T> = Result<T, ClientError>;
