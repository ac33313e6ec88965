//! The watchdog actor: periodic session audits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tabsync_session::{ProfileFetcher, SessionCoordinator, SessionError, SignOutReason};
use tabsync_store::SessionStore;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{AuditScheduler, WatchdogConfig};

const EVENT_CAPACITY: usize = 16;

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// The session ended on its own; send the user to sign in.
    RedirectToSignIn { reason: SignOutReason },
}

/// Result of one audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The profile is available, fresh or refetched.
    Healthy,
    /// Nobody is signed in; nothing to check.
    SignedOut,
    /// The refresh-loop breaker is tripped; the audit was skipped.
    Suspended,
    /// Fetching failed transiently. The session is kept.
    Degraded,
    /// The session was ended and the UI was told to redirect.
    Redirected(SignOutReason),
}

/// Audit counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogStats {
    /// Audits run, periodic and on demand.
    pub audits: u64,
    pub redirects: u64,
    pub degraded: u64,
    /// Audits skipped because the session was suspended.
    pub skipped: u64,
    /// Periodic ticks that fired late.
    pub overruns: u64,
}

#[derive(Debug, Default)]
struct Counters {
    audits: AtomicU64,
    redirects: AtomicU64,
    degraded: AtomicU64,
    skipped: AtomicU64,
    overruns: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &AuditOutcome) {
        self.audits.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            AuditOutcome::Redirected(_) => &self.redirects,
            AuditOutcome::Degraded => &self.degraded,
            AuditOutcome::Suspended => &self.skipped,
            AuditOutcome::Healthy | AuditOutcome::SignedOut => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> WatchdogStats {
        WatchdogStats {
            audits: self.audits.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

/// Checks the session once.
///
/// 1. Skipped while the coordinator is suspended.
/// 2. An expired credential is signed out with [`SignOutReason::Expired`].
/// 3. Otherwise reads the profile through the coordinator's cache, which
///    refetches once the TTL has passed. A rejected credential has already
///    been signed out by the coordinator.
///
/// The watchdog has no network access of its own.
pub async fn audit<S: SessionStore, F: ProfileFetcher>(
    coordinator: &SessionCoordinator<S, F>,
) -> AuditOutcome {
    if coordinator.is_suspended() {
        return AuditOutcome::Suspended;
    }
    let session = coordinator.snapshot();
    if !session.is_authenticated() {
        return AuditOutcome::SignedOut;
    }

    let expired = session
        .claims
        .as_ref()
        .is_some_and(|c| c.is_expired_at(SystemTime::now()));
    if expired {
        coordinator
            .sign_out_if_current(session.generation, SignOutReason::Expired)
            .await;
        return AuditOutcome::Redirected(SignOutReason::Expired);
    }

    match coordinator.get_profile(false).await {
        Ok(Some(_)) => AuditOutcome::Healthy,
        Ok(None) => AuditOutcome::SignedOut,
        Err(SessionError::InvalidCredential) => {
            AuditOutcome::Redirected(SignOutReason::InvalidCredential)
        }
        Err(SessionError::RefreshLoopSuspended) => AuditOutcome::Suspended,
        Err(e) => {
            tracing::warn!(error = %e, "session audit degraded");
            AuditOutcome::Degraded
        }
    }
}

enum Command {
    Pause,
    Resume,
    AuditNow(oneshot::Sender<AuditOutcome>),
}

/// Periodically audits a [`SessionCoordinator`].
///
/// Runs as its own task (actor), driven by an [`AuditScheduler`] and a
/// command channel. Control it through the [`WatchdogHandle`] returned by
/// [`spawn`](Self::spawn).
pub struct Watchdog<S, F> {
    coordinator: SessionCoordinator<S, F>,
    scheduler: AuditScheduler,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<WatchdogEvent>,
    counters: Arc<Counters>,
}

impl<S: SessionStore, F: ProfileFetcher> Watchdog<S, F> {
    /// Starts the watchdog task. Must be called within a tokio runtime.
    pub fn spawn(coordinator: SessionCoordinator<S, F>, config: WatchdogConfig) -> WatchdogHandle {
        let config = config.validated();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let counters = Arc::new(Counters::default());

        let watchdog = Self {
            coordinator,
            scheduler: AuditScheduler::new(&config),
            commands,
            events: events.clone(),
            counters: Arc::clone(&counters),
        };
        let task = tokio::spawn(watchdog.run());

        WatchdogHandle {
            commands: command_tx,
            events,
            counters,
            task,
        }
    }

    async fn run(mut self) {
        tracing::debug!(tab_id = %self.coordinator.tab_id(), "watchdog started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Pause) => self.scheduler.pause(),
                    Some(Command::Resume) => self.scheduler.resume(),
                    Some(Command::AuditNow(reply)) => {
                        let outcome = self.audit().await;
                        let _ = reply.send(outcome);
                    }
                    None => break,
                },
                tick = self.scheduler.wait_for_tick() => {
                    if tick.overrun {
                        self.counters.overruns.fetch_add(1, Ordering::Relaxed);
                    }
                    self.audit().await;
                }
            }
        }
        tracing::debug!(tab_id = %self.coordinator.tab_id(), "watchdog stopped");
    }

    async fn audit(&self) -> AuditOutcome {
        let outcome = audit(&self.coordinator).await;
        self.counters.record(&outcome);
        tracing::trace!(?outcome, "session audited");

        if let AuditOutcome::Redirected(reason) = outcome {
            tracing::info!(
                tab_id = %self.coordinator.tab_id(),
                %reason,
                "session ended, redirecting to sign-in"
            );
            let _ = self.events.send(WatchdogEvent::RedirectToSignIn { reason });
        }
        outcome
    }
}

/// Controls a running [`Watchdog`]. Dropping it stops the task.
#[derive(Debug)]
pub struct WatchdogHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<WatchdogEvent>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Stops periodic audits (the tab was frozen).
    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    /// Restarts periodic audits, the next one a full interval from now.
    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    /// Runs an audit right away, paused or not.
    ///
    /// Returns `None` if the watchdog has stopped.
    pub async fn audit_now(&self) -> Option<AuditOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.commands.send(Command::AuditNow(reply)).ok()?;
        outcome.await.ok()
    }

    /// Redirect notifications. Slow receivers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchdogEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> WatchdogStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the watchdog. Same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
