//! The same-origin broadcast channel.

use std::sync::Arc;

use tokio::sync::broadcast;

/// One encoded message on the bus. Cheap to clone for each listener.
pub type Frame = Arc<[u8]>;

/// A same-origin broadcast channel shared by every tab of that origin.
///
/// Cloning the bus is how a new tab "opens" the channel. Different buses
/// are different origins and never see each other's frames.
#[derive(Debug, Clone)]
pub struct OriginBus {
    origin: Arc<str>,
    tx: broadcast::Sender<Frame>,
}

impl OriginBus {
    /// Frames buffered per listener before the oldest are dropped.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(origin: impl Into<String>) -> Self {
        Self::with_capacity(origin, Self::DEFAULT_CAPACITY)
    }

    /// A bus buffering up to `capacity` frames per listener (minimum 1).
    pub fn with_capacity(origin: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let origin: String = origin.into();
        Self {
            origin: origin.into(),
            tx,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Posts a frame to every current listener.
    ///
    /// Returns how many listeners it was queued for. With no listeners the
    /// frame is dropped and 0 is returned.
    pub fn post(&self, frame: Frame) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }

    /// Starts listening. Only frames posted after this call are received.
    pub fn listen(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
