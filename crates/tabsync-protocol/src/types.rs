//! Session wire types.
//!
//! Everything here is either sent between tabs over the origin channel or
//! received from the identity provider, so every type derives serde and the
//! JSON field names are part of the contract.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies one tab (or window) of the origin.
///
/// Every broadcast carries the id of the tab that published it so a tab
/// can drop its own echoes when the channel loops back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random 32-character hex id (128 bits).
    pub fn random() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The epoch of a session.
///
/// Incremented on every sign-in and sign-out. It is the only thing used to
/// decide which of two session states is newer; wall-clock timestamps from
/// other tabs may be skewed and are never compared.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation of a tab that has never seen a session.
    pub const ZERO: Self = Self(0);

    /// The last representable generation. It has no successor.
    pub const MAX: Self = Self(u64::MAX);

    /// Returns the following generation.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// `false` for [`Generation::MAX`]: a session at that generation could
    /// never change again, so it must not be adopted from outside.
    pub fn can_advance(self) -> bool {
        self < Self::MAX
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The application-level user record returned by the identity provider.
///
/// Only `id` is required. Unknown fields are kept in `extra` so a newer
/// backend can add fields without breaking older tabs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable user identifier.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Everything else the backend sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Creates a profile with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            display_name: None,
            email: None,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcast messages
// ---------------------------------------------------------------------------

/// What happened in the tab that published a [`BroadcastMessage`].
///
/// Serialized as `"SIGNED_IN"`, `"SIGNED_OUT"`, `"PROFILE_UPDATED"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    SignedIn,
    SignedOut,
    ProfileUpdated,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedIn => write!(f, "SIGNED_IN"),
            Self::SignedOut => write!(f, "SIGNED_OUT"),
            Self::ProfileUpdated => write!(f, "PROFILE_UPDATED"),
        }
    }
}

/// A session change announced to every other tab of the origin.
///
/// Wire shape:
///
/// ```text
/// { "type": "SIGNED_IN", "originTabId": "…", "generation": 4,
///   "payload": { … }, "timestamp": 1700000000000 }
/// ```
///
/// Created on every local session mutation, consumed by the other tabs,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    pub origin_tab_id: TabId,

    pub generation: Generation,

    /// Opaque JSON. Session messages use the [`SessionPayload`] shape.
    #[serde(default)]
    pub payload: Value,

    /// Unix milliseconds at the publisher. Informational only.
    pub timestamp: u64,
}

impl BroadcastMessage {
    /// Builds a message carrying a [`SessionPayload`], stamped with the
    /// current wall-clock time.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the payload cannot be serialized.
    pub fn session(
        kind: MessageKind,
        origin_tab_id: TabId,
        generation: Generation,
        payload: &SessionPayload,
    ) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        Ok(Self {
            kind,
            origin_tab_id,
            generation,
            payload,
            timestamp: unix_millis(),
        })
    }

    /// Reads the payload back as a [`SessionPayload`].
    ///
    /// A `null` payload reads as an empty one.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the payload has the wrong shape.
    pub fn session_payload(&self) -> Result<SessionPayload, ProtocolError> {
        if self.payload.is_null() {
            return Ok(SessionPayload::default());
        }
        SessionPayload::deserialize(&self.payload).map_err(ProtocolError::Decode)
    }
}

/// Payload of session broadcasts.
///
/// `SIGNED_IN` and `PROFILE_UPDATED` carry the credential so a tab that
/// missed earlier messages can still catch up. `SIGNED_OUT` carries nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
