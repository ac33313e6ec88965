//! Bearer credential decoding.
//!
//! A credential is a three-segment `header.payload.signature` token. This
//! module reads the claims out of the payload segment so the session layer
//! can show who is signed in and estimate when the token expires.
//!
//! Nothing here verifies the signature. The backend does that on every
//! request; the claims decoded here are display and expiry hints only and
//! must never be used for an access decision.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// base64url that accepts the payload with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Number of leading characters shown when a credential is printed.
const FINGERPRINT_CHARS: usize = 6;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A raw bearer credential.
///
/// `Debug` and `Display` only ever show a short fingerprint, so a
/// credential can be passed to `tracing` fields without leaking it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The full token. Only hand this to the store, the fetcher, or the
    /// broadcast payload.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First few characters followed by an ellipsis.
    pub fn fingerprint(&self) -> String {
        let head: String = self.0.chars().take(FINGERPRINT_CHARS).collect();
        format!("{head}…")
    }

    /// Decodes this credential's claims. See [`decode`].
    pub fn claims(&self) -> Option<Claims> {
        decode(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Claims decoded from a credential's payload segment.
///
/// `exp` and `iat` are NumericDate values (seconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    /// `None` when `exp` is absent or lies beyond what `SystemTime` can
    /// represent.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.exp.and_then(numeric_date)
    }

    pub fn issued_at(&self) -> Option<SystemTime> {
        self.iat.and_then(numeric_date)
    }

    /// `true` once `now` has reached `exp`. A token without `exp`, or with
    /// an `exp` too far out to represent, never expires as far as the
    /// claims are concerned.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at().is_some_and(|exp| now >= exp)
    }

    /// Looks up any other claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

fn numeric_date(secs: u64) -> Option<SystemTime> {
    UNIX_EPOCH.checked_add(Duration::from_secs(secs))
}

/// Decodes the claims of a `header.payload.signature` credential.
///
/// Returns `None`, never panics, for any malformed input: a segment count
/// other than three, an empty payload, characters outside the base64url
/// alphabet, or a payload that is not a JSON object.
///
/// ```rust
/// use tabsync_protocol::decode;
///
/// // {"sub":"u1","exp":4102444800}
/// let token = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ1MSIsImV4cCI6NDEwMjQ0NDgwMH0.sig";
/// let claims = decode(token).unwrap();
/// assert_eq!(claims.subject(), Some("u1"));
/// assert!(decode("not-a-token").is_none());
/// ```
pub fn decode(credential: &str) -> Option<Claims> {
    let mut segments = credential.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    if payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_LENIENT.decode(payload).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}
