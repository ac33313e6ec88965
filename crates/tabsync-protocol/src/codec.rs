//! Codec trait and implementations for broadcast frames.
//!
//! The cross-tab channel moves opaque byte frames. A codec turns
//! [`BroadcastMessage`](crate::BroadcastMessage) values into frames and
//! back. The transport layer only needs *something* implementing
//! [`Codec`]; JSON is what browsers put on a `BroadcastChannel`, so
//! [`JsonCodec`] is the default.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec is held by long-lived listener
/// tasks that tokio may move between worker threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use tabsync_protocol::{
///     BroadcastMessage, Codec, Generation, JsonCodec, MessageKind, TabId,
/// };
///
/// let codec = JsonCodec;
/// let msg = BroadcastMessage {
///     kind: MessageKind::SignedOut,
///     origin_tab_id: TabId::new("tab-a"),
///     generation: Generation(3),
///     payload: serde_json::Value::Null,
///     timestamp: 1_700_000_000_000,
/// };
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: BroadcastMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
