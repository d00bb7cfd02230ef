//! Error types for the relay.

use thiserror::Error;

/// Errors that can occur while admitting or delivering a send request.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// Request payload failed admission checks. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No sender credentials available at admission time.
    #[error("Missing user credentials")]
    MissingCredentials,

    /// Dispatch queue is full; the caller may retry submission later.
    #[error("Relay overloaded: dispatch queue is full")]
    Overloaded,

    /// Connection, authentication, or protocol failure at the upstream relay.
    /// Retried by the scheduler up to the attempt ceiling.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Attachment file not found.
    #[error("Attachment file not found: {0}")]
    AttachmentFileNotFound(String),

    /// Failed to read attachment file.
    #[error("Failed to read attachment: {0}")]
    AttachmentReadError(String),

    /// Attachment has no content (neither data nor path provided).
    #[error("Attachment has no content: {0}")]
    AttachmentMissingContent(String),

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the retry scheduler may attempt delivery again after this
    /// error. A missing attachment file will not become present on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<lettre::error::Error> for RelayError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for RelayError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<lettre::address::AddressError> for RelayError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::Validation(format!("invalid email address: {err}"))
    }
}
