//! Error types for the session layer.

use tabsync_protocol::Profile;
use tabsync_store::StoreError;

use crate::FetchError;

/// Errors surfaced by [`SessionCoordinator`](crate::SessionCoordinator)
/// operations.
///
/// Transient problems (a failed store write, a single failed fetch
/// attempt) are absorbed inside the coordinator. What reaches the caller
/// either needs user-visible action or carries a stale-data indicator.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential is not a decodable `header.payload.signature` token.
    /// The session is left unauthenticated.
    #[error("credential is malformed")]
    MalformedCredential,

    /// Durable storage failed. Only returned by an explicit
    /// [`flush`](crate::SessionCoordinator::flush); everywhere else storage
    /// failures are logged and the in-memory session stays authoritative.
    #[error("session storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// Every fetch attempt failed. `cached` is the last profile fetched for
    /// this session, if any, so the UI can keep showing stale data.
    #[error("profile unavailable after {attempts} attempt(s): {last_error}")]
    ProfileUnavailable {
        attempts: u32,
        last_error: FetchError,
        cached: Option<Profile>,
    },

    /// The identity provider rejected the credential. The session has been
    /// signed out; the UI should send the user to sign in.
    #[error("credential rejected by the identity provider")]
    InvalidCredential,

    /// Too many sign-in/sign-out cycles in a short window. Automatic
    /// refreshes are halted until the user signs in explicitly.
    #[error("session refresh loop detected; sign in again to resume")]
    RefreshLoopSuspended,
}

impl SessionError {
    /// `true` for errors the UI must act on (redirect or notice).
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Self::InvalidCredential | Self::RefreshLoopSuspended)
    }

    /// The stale profile carried by [`SessionError::ProfileUnavailable`].
    pub fn cached_profile(&self) -> Option<&Profile> {
        match self {
            Self::ProfileUnavailable { cached, .. } => cached.as_ref(),
            _ => None,
        }
    }
}
