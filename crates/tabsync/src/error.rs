//! Unified error type for tabsync.

use tabsync_lifecycle::LifecycleError;
use tabsync_protocol::ProtocolError;
use tabsync_session::SessionError;
use tabsync_store::StoreError;
use tabsync_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically, so callers of the `tabsync` crate match on one
/// type.
#[derive(Debug, thiserror::Error)]
pub enum TabsyncError {
    /// Encoding or decoding a token or broadcast frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Durable storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Publishing to the origin bus failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session operation failed (rejected credential, refresh loop, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Registering a lifecycle consumer failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),
}
