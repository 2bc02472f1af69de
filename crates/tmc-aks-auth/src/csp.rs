//! VMware Cloud Services (CSP) API token exchange.
//!
//! TMC accepts short-lived access tokens issued by CSP in exchange for a
//! long-lived API token. The exchanged token is cached until shortly before
//! it expires.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::token::TokenSource;

/// Path of the CSP API token exchange endpoint.
const AUTHORIZE_PATH: &str = "/csp/gateway/am/api/auth/api-tokens/authorize";

/// Tokens closer than this to expiry are exchanged again.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Upper bound on the lifetime accepted from the server (one day).
const MAX_LIFETIME_SECS: i64 = 86_400;

/// Raw response from the exchange endpoint.
#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Token source that exchanges a CSP API token for access tokens.
pub struct CspTokenSource {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl CspTokenSource {
    /// Create a token source for the given CSP base URL and API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_client(base_url, api_token, client))
    }

    /// Create a token source with a custom HTTP client.
    #[must_use]
    pub fn with_client(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            client,
            cache: RwLock::new(None),
        }
    }

    /// Get the CSP base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drop the cached access token so the next call exchanges again.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    async fn exchange(&self) -> Result<CachedToken> {
        let url = format!("{}{AUTHORIZE_PATH}", self.base_url);
        tracing::debug!(url = %url, "Exchanging CSP API token");

        let response = self
            .client
            .post(&url)
            .form(&[("refresh_token", self.api_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AuthError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let raw: AuthorizeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        let expires_in = i64::try_from(raw.expires_in)
            .unwrap_or(MAX_LIFETIME_SECS)
            .min(MAX_LIFETIME_SECS);
        Ok(CachedToken {
            token: raw.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        })
    }
}

impl std::fmt::Debug for CspTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CspTokenSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for CspTokenSource {
    async fn access_token(&self) -> Result<String> {
        {
            let cache = self.cache.read();
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(Utc::now())) {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        tracing::debug!(expires_at = %fresh.expires_at, "Cached CSP access token");

        let token = fresh.token.clone();
        *self.cache.write() = Some(fresh);
        Ok(token)
    }
}
