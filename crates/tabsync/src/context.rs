//! `TabContext` builder and teardown.
//!
//! One tab's wiring: the session coordinator over a namespaced store, the
//! cross-tab listener feeding it, the lifecycle manager driving
//! revalidation, and the watchdog auditing it.

use std::sync::Arc;

use tabsync_lifecycle::{
    LifecycleCallbacks, LifecycleManager, LifecycleSignal, LifecycleState, Registration,
};
use tabsync_protocol::TabId;
use tabsync_session::{ProfileFetcher, SessionCoordinator, SessionError};
use tabsync_store::{Namespaced, SessionStore};
use tabsync_transport::{Broadcaster, OriginBus, Subscription};
use tabsync_watchdog::{Watchdog, WatchdogHandle};
use tokio::runtime::Handle;

use crate::{TabsyncConfig, TabsyncError};

/// Lifecycle consumer id the context registers for itself.
pub const SESSION_CONSUMER: &str = "session";

/// The coordinator type a [`TabContext`] runs: keys are prefixed with the
/// configured namespace.
pub type TabCoordinator<S, F> = SessionCoordinator<Namespaced<S>, F>;

/// Builder for a [`TabContext`].
///
/// # Example
///
/// ```rust,ignore
/// use tabsync::prelude::*;
///
/// let config = TabsyncConfig::default();
/// let bus = config.origin_bus("https://shop.example");
/// let tab = TabContextBuilder::new()
///     .config(config)
///     .build(MemoryStore::new(), my_fetcher, bus)
///     .await?;
/// tab.coordinator().sign_in(token).await?;
/// ```
pub struct TabContextBuilder {
    tab_id: Option<TabId>,
    config: TabsyncConfig,
}

impl TabContextBuilder {
    /// Creates a new builder with default settings and a random tab id.
    pub fn new() -> Self {
        Self {
            tab_id: None,
            config: TabsyncConfig::default(),
        }
    }

    /// Uses a fixed tab id instead of a random one.
    pub fn tab_id(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    pub fn config(mut self, config: TabsyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the tab and starts its background tasks.
    ///
    /// In order: starts listening to the other tabs, restores a persisted
    /// session, registers the session's lifecycle hooks, and spawns the
    /// watchdog. Listening comes first so a change announced while the
    /// store is being read is not missed.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Returns [`TabsyncError::Session`] if restoring is refused and
    /// [`TabsyncError::Lifecycle`] if the session consumer cannot register.
    pub async fn build<S, F>(
        self,
        store: S,
        fetcher: F,
        bus: OriginBus,
    ) -> Result<TabContext<S, F>, TabsyncError>
    where
        S: SessionStore,
        F: ProfileFetcher,
    {
        let config = self.config.validated();
        let tab_id = self.tab_id.unwrap_or_else(TabId::random);
        let runtime = Handle::current();

        let store = Namespaced::new(store, config.store_namespace.clone());
        let broadcaster = Broadcaster::new(tab_id.clone(), bus);
        let coordinator = SessionCoordinator::new(
            store,
            fetcher,
            broadcaster.clone(),
            config.coordinator.clone(),
        );

        let subscription = {
            let coordinator = coordinator.clone();
            broadcaster.subscribe(move |message| {
                coordinator.apply_remote(&message);
            })
        };

        let restored = coordinator.restore().await?;

        let watchdog = Arc::new(Watchdog::spawn(
            coordinator.clone(),
            config.watchdog.clone(),
        ));
        let lifecycle = LifecycleManager::new(config.lifecycle.clone());
        let registration = lifecycle.register(
            SESSION_CONSUMER,
            session_callbacks(&coordinator, &watchdog, &runtime),
        )?;

        tracing::info!(
            %tab_id,
            restored,
            generation = %coordinator.generation(),
            "tab context ready"
        );

        Ok(TabContext {
            coordinator,
            lifecycle,
            watchdog,
            config,
            registration: Some(registration),
            subscription: Some(subscription),
        })
    }
}

impl Default for TabContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hooks that keep the session honest across page lifecycle changes.
///
/// - resume: forced profile refetch, watchdog restarted
/// - freeze: watchdog paused
/// - terminate: best-effort flush of the durable mirror
fn session_callbacks<S, F>(
    coordinator: &TabCoordinator<S, F>,
    watchdog: &Arc<WatchdogHandle>,
    runtime: &Handle,
) -> LifecycleCallbacks
where
    S: SessionStore,
    F: ProfileFetcher,
{
    let on_resume = {
        let coordinator = coordinator.clone();
        let watchdog = Arc::clone(watchdog);
        let runtime = runtime.clone();
        move || {
            watchdog.resume();
            let coordinator = coordinator.clone();
            runtime.spawn(async move { revalidate(&coordinator).await });
        }
    };
    let on_freeze = {
        let watchdog = Arc::clone(watchdog);
        move || watchdog.pause()
    };
    let on_terminate = {
        let coordinator = coordinator.clone();
        let runtime = runtime.clone();
        move || {
            let coordinator = coordinator.clone();
            runtime.spawn(async move {
                if let Err(e) = coordinator.flush().await {
                    tracing::warn!(tab_id = %coordinator.tab_id(), error = %e, "flush on teardown failed");
                }
            });
        }
    };

    LifecycleCallbacks::new()
        .on_resume(on_resume)
        .on_freeze(on_freeze)
        .on_terminate(on_terminate)
}

/// Refetches the profile after the tab was frozen. Whatever happened
/// while the tab slept, the cache is not trusted.
async fn revalidate<S: SessionStore, F: ProfileFetcher>(coordinator: &TabCoordinator<S, F>) {
    let tab_id = coordinator.tab_id();
    match coordinator.get_profile(true).await {
        Ok(Some(profile)) => tracing::debug!(%tab_id, user_id = %profile.id, "revalidated after resume"),
        Ok(None) => tracing::debug!(%tab_id, "nothing to revalidate, signed out"),
        Err(SessionError::RefreshLoopSuspended) => {
            tracing::debug!(%tab_id, "revalidation skipped, session suspended");
        }
        Err(e) => tracing::warn!(%tab_id, error = %e, "revalidation after resume failed"),
    }
}

/// One tab: its session, lifecycle, and watchdog.
///
/// Built with [`TabContextBuilder`]. Dropping it stops every background
/// task; [`shutdown`](Self::shutdown) also tells lifecycle consumers and
/// flushes the session to storage.
pub struct TabContext<S, F> {
    coordinator: TabCoordinator<S, F>,
    lifecycle: LifecycleManager,
    watchdog: Arc<WatchdogHandle>,
    config: TabsyncConfig,
    registration: Option<Registration>,
    subscription: Option<Subscription>,
}

impl<S: SessionStore, F: ProfileFetcher> TabContext<S, F> {
    pub fn tab_id(&self) -> &TabId {
        self.coordinator.tab_id()
    }

    /// The session coordinator: sign in, sign out, read the profile.
    pub fn coordinator(&self) -> &TabCoordinator<S, F> {
        &self.coordinator
    }

    /// The lifecycle manager. Register UI consumers here.
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// The watchdog, for redirect events, stats, and on-demand audits.
    pub fn watchdog(&self) -> &WatchdogHandle {
        &self.watchdog
    }

    /// The validated configuration the tab runs with.
    pub fn config(&self) -> &TabsyncConfig {
        &self.config
    }

    /// Feeds a host signal to the lifecycle manager.
    ///
    /// Returns the new state if the signal caused a transition.
    pub fn signal(&self, signal: LifecycleSignal) -> Option<LifecycleState> {
        self.lifecycle.signal(signal)
    }

    /// Tears the tab down.
    ///
    /// Stops listening to other tabs, notifies lifecycle consumers with
    /// `terminate`, flushes the session, and stops the watchdog.
    ///
    /// # Errors
    /// Returns [`TabsyncError::Session`] if the final flush failed. The tab
    /// is torn down either way.
    pub async fn shutdown(mut self) -> Result<(), TabsyncError> {
        let tab_id = self.tab_id().clone();
        drop(self.subscription.take());
        // The session hook would spawn its own flush; this one is awaited.
        drop(self.registration.take());
        self.lifecycle.signal(LifecycleSignal::Terminate);

        let flushed = self.coordinator.flush().await;
        tracing::info!(%tab_id, flushed = flushed.is_ok(), "tab context shut down");
        flushed?;
        Ok(())
    }
}
