//! Error types for TMC service calls.

use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by the cluster and node pool services.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The addressed object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An object with the same full name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The server returned an error status.
    #[error("TMC API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request could not be sent or the response not received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// No access token could be obtained.
    #[error("authentication error: {0}")]
    Auth(#[from] tmc_aks_auth::AuthError),
}

impl ClientError {
    /// Returns `true` if the addressed object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if the object being created already exists.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
