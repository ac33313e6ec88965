//! Lifecycle manager: turns raw page signals into debounced consumer
//! callbacks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::callbacks::Dispatch;
use crate::{LifecycleCallbacks, LifecycleConfig, LifecycleError, LifecycleSignal, LifecycleState};

struct Consumer {
    callbacks: Arc<LifecycleCallbacks>,
    debounce: Duration,
    /// This consumer was told the page is hidden and hasn't been told it
    /// is visible again.
    hidden_dispatched: bool,
}

struct State {
    lifecycle: LifecycleState,
    consumers: BTreeMap<String, Consumer>,
    /// Bumped whenever pending hidden dispatches must be dropped.
    hide_epoch: u64,
    timers: Vec<JoinHandle<()>>,
}

struct Inner {
    config: LifecycleConfig,
    state: Mutex<State>,
}

type Batch = Vec<(String, Arc<LifecycleCallbacks>, Dispatch)>;

/// Tracks the page lifecycle and notifies registered consumers.
///
/// Cheap to clone; clones share state. [`signal`](Self::signal) is
/// synchronous but spawns debounce timers, so it must be called from
/// within a tokio runtime.
///
/// # Debounce
///
/// A hidden page is only reported to a consumer after it stayed hidden for
/// that consumer's debounce delay. If it becomes visible first, the
/// consumer hears nothing at all:
///
/// ```text
/// Hidden ──(150 ms)── Visible             → no callbacks
/// Hidden ──(300 ms)── on_visibility(false)
///        ──(200 ms)── Visible             → on_visibility(true)
/// ```
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<Inner>,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    lifecycle: LifecycleState::Active,
                    consumers: BTreeMap::new(),
                    hide_epoch: 0,
                    timers: Vec::new(),
                }),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().lifecycle
    }

    pub fn consumer_count(&self) -> usize {
        self.lock().consumers.len()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// Adds a consumer. It is removed when the returned [`Registration`]
    /// is dropped.
    ///
    /// # Errors
    /// - [`LifecycleError::DuplicateConsumer`] if `id` is taken
    /// - [`LifecycleError::Terminated`] after teardown
    pub fn register(
        &self,
        id: impl Into<String>,
        callbacks: LifecycleCallbacks,
    ) -> Result<Registration, LifecycleError> {
        let id = id.into();
        let mut state = self.lock();
        if state.lifecycle.is_terminated() {
            return Err(LifecycleError::Terminated);
        }
        if state.consumers.contains_key(&id) {
            return Err(LifecycleError::DuplicateConsumer(id));
        }

        let debounce = callbacks
            .debounce_delay
            .unwrap_or(self.inner.config.debounce_delay);
        state.consumers.insert(
            id.clone(),
            Consumer {
                callbacks: Arc::new(callbacks),
                debounce,
                hidden_dispatched: false,
            },
        );
        tracing::debug!(consumer = %id, ?debounce, "lifecycle consumer registered");

        Ok(Registration {
            id,
            manager: Arc::downgrade(&self.inner),
        })
    }

    /// Feeds a signal from the host environment.
    ///
    /// Returns the new state if the signal caused a transition.
    pub fn signal(&self, signal: LifecycleSignal) -> Option<LifecycleState> {
        let mut batch = Batch::new();
        let transition = {
            let mut state = self.lock();
            let from = state.lifecycle;

            match signal {
                LifecycleSignal::Focus | LifecycleSignal::Blur => {
                    if from.accepts_focus() {
                        let dispatch = if signal == LifecycleSignal::Focus {
                            Dispatch::Focus
                        } else {
                            Dispatch::Blur
                        };
                        queue_all(&state, dispatch, &mut batch);
                    }
                    None
                }
                _ => match from.apply(signal) {
                    Some(to) => {
                        state.lifecycle = to;
                        self.on_transition(&mut state, from, to, &mut batch);
                        Some((from, to))
                    }
                    None => {
                        tracing::trace!(state = %from, ?signal, "lifecycle signal ignored");
                        None
                    }
                },
            }
        };

        if let Some((from, to)) = transition {
            tracing::info!(%from, %to, "lifecycle transition");
        }
        run(batch);
        transition.map(|(_, to)| to)
    }

    fn on_transition(
        &self,
        state: &mut State,
        from: LifecycleState,
        to: LifecycleState,
        batch: &mut Batch,
    ) {
        use LifecycleState::*;

        // Every transition except entering Hidden invalidates the
        // debounce timers of the previous hide.
        if to != Hidden {
            cancel_pending(state);
        }

        match (from, to) {
            (Active, Hidden) => self.schedule_hidden(state, batch),
            (Hidden, Active) => queue_visible(state, batch),
            (_, Frozen) => queue_all(state, Dispatch::Freeze, batch),
            (Frozen, Active) => {
                queue_all(state, Dispatch::Resume, batch);
                queue_visible(state, batch);
            }
            (_, Terminated) => queue_all(state, Dispatch::Terminate, batch),
            _ => {}
        }
    }

    /// Starts one debounce timer per consumer. Zero-delay consumers are
    /// told right away.
    fn schedule_hidden(&self, state: &mut State, batch: &mut Batch) {
        let epoch = state.hide_epoch;
        let mut timers = Vec::new();
        for (id, consumer) in state.consumers.iter_mut() {
            if consumer.debounce.is_zero() {
                consumer.hidden_dispatched = true;
                batch.push((
                    id.clone(),
                    Arc::clone(&consumer.callbacks),
                    Dispatch::Visibility(false),
                ));
                continue;
            }
            let manager = Arc::downgrade(&self.inner);
            let id = id.clone();
            let delay = consumer.debounce;
            timers.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = manager.upgrade() {
                    LifecycleManager { inner }.fire_hidden(&id, epoch);
                }
            }));
        }
        state.timers.extend(timers);
    }

    /// A debounce timer elapsed: report hidden if nothing intervened.
    fn fire_hidden(&self, id: &str, epoch: u64) {
        let callbacks = {
            let mut state = self.lock();
            if state.hide_epoch != epoch || state.lifecycle != LifecycleState::Hidden {
                return;
            }
            match state.consumers.get_mut(id) {
                Some(consumer) if !consumer.hidden_dispatched => {
                    consumer.hidden_dispatched = true;
                    Arc::clone(&consumer.callbacks)
                }
                _ => return,
            }
        };
        tracing::debug!(consumer = id, "dispatching hidden");
        callbacks.dispatch(Dispatch::Visibility(false));
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.inner)
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LifecycleManager")
            .field("state", &state.lifecycle)
            .field("consumers", &state.consumers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn lock(inner: &Inner) -> MutexGuard<'_, State> {
    inner.state.lock().unwrap_or_else(|e| e.into_inner())
}

fn cancel_pending(state: &mut State) {
    state.hide_epoch += 1;
    for timer in state.timers.drain(..) {
        timer.abort();
    }
}

fn queue_all(state: &State, dispatch: Dispatch, batch: &mut Batch) {
    batch.extend(
        state
            .consumers
            .iter()
            .map(|(id, c)| (id.clone(), Arc::clone(&c.callbacks), dispatch)),
    );
}

/// Visible goes only to consumers that were told hidden.
fn queue_visible(state: &mut State, batch: &mut Batch) {
    for (id, consumer) in state.consumers.iter_mut() {
        if std::mem::take(&mut consumer.hidden_dispatched) {
            batch.push((
                id.clone(),
                Arc::clone(&consumer.callbacks),
                Dispatch::Visibility(true),
            ));
        }
    }
}

fn run(batch: Batch) {
    for (id, callbacks, dispatch) in batch {
        tracing::debug!(consumer = %id, ?dispatch, "lifecycle dispatch");
        callbacks.dispatch(dispatch);
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Keeps a consumer registered. Dropping it unregisters the consumer.
#[derive(Debug)]
#[must_use = "dropping a Registration unregisters the consumer"]
pub struct Registration {
    id: String,
    manager: Weak<Inner>,
}

impl Registration {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unregisters now. Same as dropping.
    pub fn unregister(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(inner) = self.manager.upgrade() {
            if lock(&inner).consumers.remove(&self.id).is_some() {
                tracing::debug!(consumer = %self.id, "lifecycle consumer unregistered");
            }
        }
    }
}
