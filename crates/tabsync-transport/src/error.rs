use tabsync_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
///
/// A missing or lagging receiver is not an error: the channel is
/// best-effort and such frames are simply lost.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The message could not be turned into a frame.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] ProtocolError),
}
