// Error handling module
// Defines the failure taxonomy surfaced by the client

use thiserror::Error;

/// Errors surfaced to callers of the authenticated client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network or timeout failure before any response was received
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status passed through from the server
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// The token refresh call itself returned an error status
    #[error("Session expired: token refresh failed: {status} - {message}")]
    RefreshFailed { status: u16, message: String },

    /// The refresh call succeeded but carried no usable token
    #[error("Session expired: refresh response carried no token")]
    RefreshMalformed,

    /// An authentication response was missing its Authorization header
    #[error("Authentication succeeded but no token was provided")]
    MissingToken,

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Outcome of a refresh cycle, fanned out to every queued waiter.
/// Cloneable so a single failed cycle can reject all of them.
#[derive(Debug, Clone)]
pub enum RefreshError {
    /// Refresh request never produced a response
    Transport(String),

    /// Refresh endpoint rejected the call
    Failed { status: u16, message: String },

    /// Refresh returned 2xx without a parseable Authorization header
    Malformed,
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::Transport(msg) => write!(f, "refresh transport error: {}", msg),
            RefreshError::Failed { status, message } => {
                write!(f, "refresh rejected: {} - {}", status, message)
            }
            RefreshError::Malformed => write!(f, "refresh response carried no token"),
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Transport(msg) => ApiError::RefreshFailed {
                status: 0,
                message: msg,
            },
            RefreshError::Failed { status, message } => {
                ApiError::RefreshFailed { status, message }
            }
            RefreshError::Malformed => ApiError::RefreshMalformed,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
