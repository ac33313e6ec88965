//! Cross-tab broadcast for tabsync.
//!
//! Two pieces:
//!
//! - [`OriginBus`]: the same-origin channel itself. Every tab of an origin
//!   holds a clone; a frame posted by one is seen by all listeners.
//!   Delivery is best-effort: no acknowledgment, no retry, and a listener
//!   that falls too far behind loses the oldest frames.
//! - [`Broadcaster`]: one tab's view of the bus. Encodes
//!   [`BroadcastMessage`](tabsync_protocol::BroadcastMessage)s, tags them
//!   with the tab id, and drops its own echoes on the way back in.
//!
//! Frames from a single tab reach every other tab in publish order. There
//! is no ordering across different publishing tabs, which is why the
//! session layer applies remote messages by generation, not arrival order.

mod broadcaster;
mod bus;
mod error;

pub use broadcaster::{Broadcaster, Subscription};
pub use bus::{Frame, OriginBus};
pub use error::TransportError;
