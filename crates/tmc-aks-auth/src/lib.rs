//! Bearer token acquisition for the Tanzu Mission Control API.
//!
//! TMC requests carry a short-lived access token issued by VMware Cloud
//! Services (CSP). This crate hides where that token comes from behind the
//! [`TokenSource`] trait:
//!
//! - [`StaticToken`]: an access token supplied directly by the user
//! - [`CspTokenSource`]: exchanges a long-lived CSP API token and caches the
//!   resulting access token until shortly before it expires
//!
//! # Example
//!
//! ```no_run
//! use tmc_aks_auth::{AuthConfig, TokenSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig {
//!     api_token: Some("my-csp-api-token".to_string()),
//!     ..AuthConfig::default()
//! };
//!
//! let source = config.token_source()?;
//! let token = source.access_token().await?;
//! println!("Bearer {token}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod csp;
pub mod error;
pub mod token;

use std::sync::Arc;

pub use csp::CspTokenSource;
pub use error::{AuthError, Result};
pub use token::{StaticToken, TokenSource};

#[cfg(any(test, feature = "test-utils"))]
pub use token::MockTokenSource;

/// Default CSP endpoint.
pub const DEFAULT_CSP_ENDPOINT: &str = "https://console.cloud.vmware.com";

/// Credentials used to talk to TMC.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// CSP base URL used for the token exchange.
    pub csp_endpoint: String,
    /// Long-lived CSP API token.
    pub api_token: Option<String>,
    /// Pre-issued access token; takes precedence over `api_token`.
    pub access_token: Option<String>,
}

impl AuthConfig {
    /// Build the token source matching the configured credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredential` if neither token is set, or an
    /// error if the HTTP client cannot be built.
    pub fn token_source(&self) -> Result<Arc<dyn TokenSource>> {
        if let Some(token) = non_empty(self.access_token.as_deref()) {
            return Ok(Arc::new(StaticToken::new(token)));
        }
        if let Some(api_token) = non_empty(self.api_token.as_deref()) {
            return Ok(Arc::new(CspTokenSource::new(&self.csp_endpoint, api_token)?));
        }
        Err(AuthError::MissingCredential)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            csp_endpoint: DEFAULT_CSP_ENDPOINT.to_string(),
            api_token: None,
            access_token: None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
