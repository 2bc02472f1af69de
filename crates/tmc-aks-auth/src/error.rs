//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was configured.
    #[error("no API token or access token configured")]
    MissingCredential,

    /// CSP rejected the refresh token.
    #[error("token exchange rejected: HTTP {status}: {message}")]
    Rejected {
        /// HTTP status returned by CSP.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// CSP rate limited the exchange.
    #[error("rate limited")]
    RateLimited,

    /// The exchange request could not be sent.
    #[error("token exchange request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The exchange response could not be decoded.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Returns `true` if retrying the exchange later may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Request(_))
    }
}
