//! Error types for the protocol layer.
//!
//! Each crate in tabsync defines its own error enum, so a `ProtocolError`
//! always means a problem turning messages into frames or back, never a
//! storage or network failure.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a message or payload failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or a payload that does not match the expected shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules, e.g. a
    /// `SIGNED_IN` whose payload carries no credential.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
