//! Session types: what one tab knows about the signed-in user.
//!
//! A [`Session`] records:
//! - WHO is signed in (`user_id`, `credential`, decoded `claims`)
//! - WHAT the backend says about them (`profile`, cached until a TTL)
//! - WHICH epoch this state belongs to (`generation`)

use std::fmt;
use std::time::Duration;

use tabsync_protocol::{Claims, Credential, Generation, Profile};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The authenticated identity held by one tab.
///
/// Owned exclusively by the [`SessionCoordinator`](crate::SessionCoordinator);
/// callers only ever see clones from
/// [`snapshot`](crate::SessionCoordinator::snapshot).
///
/// `fetched_at` is a tokio [`Instant`], the monotonic clock, so TTL checks
/// are unaffected by wall-clock changes and follow `tokio::time::pause`
/// in tests.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// `sub` claim, or the profile id once a profile is fetched.
    pub user_id: Option<String>,

    /// Raw bearer token. Prints as a fingerprint.
    pub credential: Option<Credential>,

    /// Claims decoded from `credential`. Hints, not authority.
    pub claims: Option<Claims>,

    /// Last profile fetched for this generation.
    pub profile: Option<Profile>,

    /// When `profile` was fetched.
    pub fetched_at: Option<Instant>,

    /// Changes together with `credential`, on every sign-in and sign-out.
    pub generation: Generation,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// The profile, if it was fetched less than `ttl` before `now`.
    pub fn fresh_profile(&self, now: Instant, ttl: Duration) -> Option<&Profile> {
        let fetched_at = self.fetched_at?;
        if now < fetched_at + ttl {
            self.profile.as_ref()
        } else {
            None
        }
    }

    /// Drops everything but the generation.
    pub(crate) fn clear(&mut self) {
        let generation = self.generation;
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    /// Replaces identity fields with a new credential at `generation`.
    pub(crate) fn replace(
        &mut self,
        generation: Generation,
        credential: Credential,
        claims: Claims,
        profile: Option<(Profile, Instant)>,
    ) {
        let (profile, fetched_at) = match profile {
            Some((p, at)) => (Some(p), Some(at)),
            None => (None, None),
        };
        self.user_id = profile
            .as_ref()
            .map(|p| p.id.clone())
            .or_else(|| claims.sub.clone());
        self.credential = Some(credential);
        self.claims = Some(claims);
        self.profile = profile;
        self.fetched_at = fetched_at;
        self.generation = generation;
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user (or app code) called `sign_out`.
    User,
    /// Another tab signed out.
    Remote,
    /// The identity provider rejected the credential.
    InvalidCredential,
    /// The credential's `exp` claim passed.
    Expired,
}

impl SignOutReason {
    /// Whether the UI should redirect to sign-in. A user-initiated sign-out
    /// already knows where it is going.
    pub fn needs_redirect(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Remote => write!(f, "remote"),
            Self::InvalidCredential => write!(f, "invalid_credential"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Local notifications for the UI layer of this tab.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn {
        generation: Generation,
        user_id: Option<String>,
        /// `true` when adopted from another tab or restored from storage.
        remote: bool,
    },
    SignedOut {
        generation: Generation,
        reason: SignOutReason,
    },
    ProfileUpdated {
        generation: Generation,
        profile: Profile,
    },
    /// The refresh-loop breaker tripped.
    Suspended { cycles: usize },
}
