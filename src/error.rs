/// Error types for session and renewal operations
use thiserror::Error;

/// Outcome of a failed renewal exchange
///
/// Cloneable because every caller attached to the same in-flight exchange
/// receives its own copy of the result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    #[error("No refresh token available")]
    NoCredential,

    #[error("Renewal exchange failed: {0}")]
    Network(String),

    #[error("Refresh token rejected: {0}")]
    Rejected(String),

    /// The stored session changed while the exchange was running
    #[error("Session changed during renewal")]
    Superseded,
}

impl RenewalError {
    /// Whether the stored refresh token is known to be unusable
    pub fn is_terminal_credential(&self) -> bool {
        matches!(self, RenewalError::Rejected(_) | RenewalError::NoCredential)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Renewal(#[from] RenewalError),

    #[error("Session is not authenticated")]
    Unauthenticated,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
