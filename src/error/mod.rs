//! Error types for chatrelay.

pub mod unified;

pub use unified::{ErrorCategory, ErrorDetails};

use thiserror::Error;

use crate::auth::AuthError;

/// Error returned by every public messaging and reconciliation operation.
///
/// Carries enough detail (HTTP status, remote error code and description)
/// for an operator to diagnose a failure without reading logs.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<ErrorDetails>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No chat ID provided and no default chat ID configured")]
    MissingChatId,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl RelayError {
    /// Create an API error without structured details.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status associated with this error, if one was received.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Authentication(AuthError::Rejected { status, .. }) => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(AuthError::Transport(_)) => ErrorCategory::Network,
            Self::Authentication(AuthError::Storage(_)) => ErrorCategory::Storage,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Network(err) if err.is_timeout() => ErrorCategory::Timeout,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Validation(_) | Self::MissingChatId => ErrorCategory::Validation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
        }
    }

    /// Whether the caller may retry this error (with its own backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }
}

impl From<rusqlite::Error> for RelayError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RelayError>;
