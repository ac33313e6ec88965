//! Profile fetch hook.
//!
//! tabsync doesn't talk to any particular identity provider. It defines
//! [`ProfileFetcher`]: one async method that takes the bearer credential
//! and returns the user's profile. The coordinator wraps every call in
//! single-flight deduplication, a per-attempt timeout, and retry with
//! backoff, so an implementation only has to make one request.
//!
//! [`HttpProfileFetcher`](crate::HttpProfileFetcher) (feature `http`) is
//! the stock implementation for an HTTPS profile endpoint.

use std::future::Future;
use std::time::Duration;

use tabsync_protocol::{Credential, Profile};

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The provider rejected the credential. Never retried; forces
    /// sign-out.
    #[error("credential rejected")]
    InvalidCredential,

    /// Network failure, non-2xx response, or an unreadable body.
    #[error("fetch failed: {0}")]
    Failed(String),

    /// The attempt exceeded the configured per-attempt timeout.
    #[error("fetch attempt timed out after {0:?}")]
    TimedOut(Duration),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidCredential)
    }
}

/// Loads the profile that belongs to a credential.
///
/// # Example
///
/// ```rust
/// use tabsync_protocol::{Credential, Profile};
/// use tabsync_session::{FetchError, ProfileFetcher};
///
/// /// Treats the credential's `sub` claim as the whole profile.
/// struct ClaimsOnlyFetcher;
///
/// impl ProfileFetcher for ClaimsOnlyFetcher {
///     async fn fetch_profile(&self, credential: &Credential) -> Result<Profile, FetchError> {
///         let claims = credential.claims().ok_or(FetchError::InvalidCredential)?;
///         let sub = claims.sub.ok_or(FetchError::InvalidCredential)?;
///         Ok(Profile::new(sub))
///     }
/// }
/// ```
pub trait ProfileFetcher: Send + Sync + 'static {
    /// Fetches the profile for `credential`.
    ///
    /// # Returns
    /// - `Ok(Profile)`: the provider accepted the credential
    /// - `Err(FetchError::InvalidCredential)`: the provider rejected it
    /// - `Err(FetchError::Failed)`: anything transient
    fn fetch_profile(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Profile, FetchError>> + Send;
}
