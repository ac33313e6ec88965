//! One tab's publisher/subscriber on the origin bus.

use std::sync::Arc;

use tabsync_protocol::{BroadcastMessage, Codec, JsonCodec, TabId};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::{OriginBus, TransportError};

/// Publishes this tab's session messages and delivers other tabs' messages.
///
/// ```text
///  tab A ── publish ──┐                  ┌── handler (tab B)
///                     ├── OriginBus ─────┤
///  tab B ── publish ──┘                  └── handler (tab A)
///                         (echoes of a tab's own frames are dropped)
/// ```
#[derive(Debug, Clone)]
pub struct Broadcaster<C: Codec = JsonCodec> {
    tab_id: TabId,
    bus: OriginBus,
    codec: Arc<C>,
}

impl Broadcaster<JsonCodec> {
    /// A broadcaster for `tab_id` using JSON frames.
    pub fn new(tab_id: TabId, bus: OriginBus) -> Self {
        Self::with_codec(tab_id, bus, JsonCodec)
    }
}

impl<C: Codec> Broadcaster<C> {
    pub fn with_codec(tab_id: TabId, bus: OriginBus, codec: C) -> Self {
        Self {
            tab_id,
            bus,
            codec: Arc::new(codec),
        }
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn bus(&self) -> &OriginBus {
        &self.bus
    }

    /// Publishes a message to every other tab. Fire-and-forget.
    ///
    /// Returns how many listeners the frame was queued for (this tab's own
    /// listener included). Delivery is not guaranteed: a tab torn down
    /// mid-send simply never sees it.
    ///
    /// # Errors
    /// Returns [`TransportError::Encode`] if the message cannot be encoded.
    pub fn publish(&self, message: &BroadcastMessage) -> Result<usize, TransportError> {
        let frame = self.codec.encode(message)?;
        let queued = self.bus.post(frame.into());
        tracing::debug!(
            tab_id = %self.tab_id,
            kind = %message.kind,
            generation = %message.generation,
            queued,
            "broadcast published"
        );
        Ok(queued)
    }

    /// Calls `handler` for every message published by *other* tabs.
    ///
    /// Spawns a listener task on the current tokio runtime; must be called
    /// from within one. Frames that fail to decode are logged and skipped.
    /// The returned [`Subscription`] stops the listener when dropped.
    pub fn subscribe<H>(&self, mut handler: H) -> Subscription
    where
        H: FnMut(BroadcastMessage) + Send + 'static,
    {
        let mut rx = self.bus.listen();
        let codec = Arc::clone(&self.codec);
        let tab_id = self.tab_id.clone();

        let task = tokio::spawn(async move {
            loop {
                let frame = match rx.recv().await {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(%tab_id, missed, "broadcast listener lagged, messages lost");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let message: BroadcastMessage = match codec.decode(&frame) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(%tab_id, error = %e, "dropping undecodable frame");
                        continue;
                    }
                };

                if message.origin_tab_id == tab_id {
                    tracing::trace!(%tab_id, "ignoring own echo");
                    continue;
                }

                tracing::debug!(
                    %tab_id,
                    from = %message.origin_tab_id,
                    kind = %message.kind,
                    generation = %message.generation,
                    "broadcast received"
                );
                handler(message);
            }
            tracing::debug!(%tab_id, "broadcast listener stopped");
        });

        Subscription { task }
    }
}

/// Disposer for a [`Broadcaster::subscribe`] listener.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) stops the
/// listener task; no handler call starts after that.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    /// `false` once the listener has stopped.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
