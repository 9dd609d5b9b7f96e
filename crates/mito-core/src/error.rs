//! Error types for mito-core

use thiserror::Error;

/// Result type alias using mito-core's Error
pub type Result<T> = std::result::Result<T, Error>;

const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";
const TIMEOUT_ERROR_MESSAGE: &str = "Request timeout. Please try again.";
const QUEUED_MESSAGE: &str = "You are offline. The change was saved and will sync when you reconnect.";

/// Errors that can occur in mito-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// A mutating request was accepted into the offline action log
    #[error("Request queued for sync (action {action_id})")]
    QueuedForSync { action_id: String },

    /// Retries exhausted without queueing
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Local durable storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Authentication flow error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Operation requires a signed-in session
    #[error("Not signed in")]
    NotAuthenticated,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True when the request was deferred into the offline queue.
    ///
    /// Callers should treat this as accepted-but-pending rather than failed.
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::QueuedForSync { .. })
    }

    /// Short human-readable text suitable for a dismissible banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => TIMEOUT_ERROR_MESSAGE.to_string(),
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Self::QueuedForSync { .. } => QUEUED_MESSAGE.to_string(),
            Self::Http { status, message } => {
                if message.trim().is_empty() || message == &format!("HTTP {status}") {
                    status_message(*status).to_string()
                } else {
                    message.clone()
                }
            }
            Self::NotAuthenticated => "Please sign in first.".to_string(),
            Self::InvalidInput(message) | Self::Auth(message) => message.clone(),
            Self::InvalidConfiguration(_) | Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// Generic message keyed by HTTP status code.
pub const fn status_message(status: u16) -> &'static str {
    match status {
        400 | 422 => "Please check your input and try again.",
        401 => "You are not authorized to perform this action.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested item was not found.",
        500..=599 => "Server error. Please try again later.",
        _ => "Request failed. Please try again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_prefers_server_message() {
        let error = Error::Http {
            status: 400,
            message: "Email already registered".to_string(),
        };
        assert_eq!(error.user_message(), "Email already registered");
    }

    #[test]
    fn http_error_without_body_uses_status_message() {
        let error = Error::Http {
            status: 503,
            message: "HTTP 503".to_string(),
        };
        assert_eq!(error.user_message(), "Server error. Please try again later.");
    }

    #[test]
    fn queued_error_is_deferred() {
        let error = Error::QueuedForSync {
            action_id: "abc".to_string(),
        };
        assert!(error.is_deferred());
        assert!(!Error::Timeout.is_deferred());
    }
}
