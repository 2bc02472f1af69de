//! The token source abstraction.

use async_trait::async_trait;

use crate::error::Result;

/// Something that can produce a bearer token for TMC requests.
///
/// Implementations cache as they see fit; callers ask for a token before
/// every request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    ///
    /// # Errors
    ///
    /// Returns an error if a token cannot be obtained.
    async fn access_token(&self) -> Result<String>;
}

/// A fixed, pre-issued access token.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Wrap an existing access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Token source for tests that counts how often it was asked.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTokenSource {
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTokenSource {
    /// Number of tokens handed out so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl TokenSource for MockTokenSource {
    async fn access_token(&self) -> Result<String> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(format!("mock-token-{n}"))
    }
}
