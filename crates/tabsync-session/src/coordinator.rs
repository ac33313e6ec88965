//! The session coordinator: the one owner of a tab's session state.
//!
//! Every read and write of the session goes through [`SessionCoordinator`]:
//! local sign-in and sign-out, profile reads, messages from other tabs, and
//! the startup restore from storage.
//!
//! # Concurrency
//!
//! The state lives behind a `std::sync::Mutex`. The guard is never held
//! across an `.await`, so each transition (check generation, mutate, pick
//! what to publish) is atomic with respect to every other task of the tab.
//! The suspension points are store I/O, profile fetches, and backoff
//! sleeps; none of them happen with the lock held.
//!
//! # Recency
//!
//! [`Generation`] decides which state is newer. It is bumped by every
//! local sign-in and sign-out, adopted from newer remote messages, and
//! persisted so a freshly opened tab starts at the latest epoch. A fetch
//! started at generation `G` is discarded if it completes at any other
//! generation.
//!
//! ```text
//!   sign_in ──→ G+1 ──→ get_profile ──→ ticket(G+1) ──→ apply if still G+1
//!                 │
//!   sign_out ─────┴──→ G+2 ─────────────────────────→ ticket(G+1) discarded
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tabsync_protocol::{
    BroadcastMessage, Claims, Credential, Generation, MessageKind, Profile, SessionPayload, TabId,
};
use tabsync_store::{SessionStore, StoreError};
use tabsync_transport::Broadcaster;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::breaker::LoopBreaker;
use crate::{
    CoordinatorConfig, FetchError, ProfileFetcher, Session, SessionError, SessionEvent,
    SignOutReason,
};

/// Store key of the raw credential.
pub const CREDENTIAL_KEY: &str = "credential";
/// Store key of the credential's decoded claims (JSON).
pub const CLAIMS_KEY: &str = "claims";
/// Store key of the session generation (decimal).
pub const GENERATION_KEY: &str = "generation";

const EVENT_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Fetch tickets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct FetchFailure {
    attempts: u32,
    error: FetchError,
}

type FetchOutcome = Result<Profile, FetchFailure>;

/// One logical profile fetch, shared by every caller that asked for the
/// profile while it was in flight.
struct FetchTicket {
    id: u64,
    generation: Generation,
    future: Shared<BoxFuture<'static, FetchOutcome>>,
}

struct State {
    session: Session,
    ticket: Option<FetchTicket>,
    breaker: LoopBreaker,
    next_ticket_id: u64,
}

struct Inner<S, F> {
    config: CoordinatorConfig,
    store: S,
    fetcher: Arc<F>,
    broadcaster: Broadcaster,
    state: Mutex<State>,
    events: broadcast::Sender<SessionEvent>,
    /// Serializes store writes so the durable mirror ends at the latest
    /// in-memory state.
    write_lock: tokio::sync::Mutex<()>,
}

/// What `get_profile` decided while holding the lock.
enum Plan {
    Done(Result<Option<Profile>, SessionError>),
    Expired(Generation),
    Await {
        generation: Generation,
        ticket_id: u64,
        future: Shared<BoxFuture<'static, FetchOutcome>>,
    },
}

/// What a finished ticket means for the caller.
enum Completion {
    Done(Result<Option<Profile>, SessionError>),
    Applied {
        profile: Profile,
        generation: Generation,
        credential: Option<Credential>,
    },
    Rejected(Generation),
}

// ---------------------------------------------------------------------------
// SessionCoordinator
// ---------------------------------------------------------------------------

/// Owns one tab's [`Session`] and keeps it consistent with storage and
/// with the other tabs of the origin.
///
/// Cheap to clone; clones share the same state.
///
/// # Example
///
/// ```rust,no_run
/// use tabsync_protocol::TabId;
/// use tabsync_session::{CoordinatorConfig, HttpProfileFetcher, SessionCoordinator};
/// use tabsync_store::MemoryStore;
/// use tabsync_transport::{Broadcaster, OriginBus};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = OriginBus::new("https://app.example");
/// let coordinator = SessionCoordinator::new(
///     MemoryStore::new(),
///     HttpProfileFetcher::new("https://id.example/me".parse()?),
///     Broadcaster::new(TabId::random(), bus),
///     CoordinatorConfig::default(),
/// );
///
/// coordinator.restore().await?;
/// if let Some(profile) = coordinator.get_profile(false).await? {
///     println!("signed in as {}", profile.id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionCoordinator<S, F> {
    inner: Arc<Inner<S, F>>,
}

impl<S, F> Clone for SessionCoordinator<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SessionStore, F: ProfileFetcher> SessionCoordinator<S, F> {
    /// Creates a coordinator with an empty session at generation zero.
    ///
    /// Call [`restore`](Self::restore) to pick up a persisted session.
    pub fn new(store: S, fetcher: F, broadcaster: Broadcaster, config: CoordinatorConfig) -> Self {
        let config = config.validated();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = State {
            session: Session::default(),
            ticket: None,
            breaker: LoopBreaker::new(config.breaker.clone()),
            next_ticket_id: 0,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                fetcher: Arc::new(fetcher),
                broadcaster,
                state: Mutex::new(state),
                events,
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    /// Returns the signed-in user's profile.
    ///
    /// Serves the cached profile while it is younger than the TTL, unless
    /// `force_refresh` is set. Otherwise fetches it; concurrent callers at
    /// the same generation share one underlying fetch.
    ///
    /// # Returns
    /// - `Ok(None)` if nobody is signed in (or the session changed while
    ///   the fetch was in flight and the new one has no fresh profile)
    /// - `Ok(Some(profile))` otherwise
    ///
    /// # Errors
    /// - [`SessionError::RefreshLoopSuspended`] while the breaker is tripped
    /// - [`SessionError::InvalidCredential`] if the provider rejected the
    ///   credential or its claims have expired; the session is signed out
    /// - [`SessionError::ProfileUnavailable`] after every attempt failed
    pub async fn get_profile(&self, force_refresh: bool) -> Result<Option<Profile>, SessionError> {
        let plan = self.plan_fetch(force_refresh);

        let (generation, ticket_id, future) = match plan {
            Plan::Done(result) => return result,
            Plan::Expired(generation) => {
                tracing::info!(tab_id = %self.tab_id(), %generation, "credential expired");
                self.sign_out_if_current(generation, SignOutReason::Expired)
                    .await;
                return Err(SessionError::InvalidCredential);
            }
            Plan::Await {
                generation,
                ticket_id,
                future,
            } => (generation, ticket_id, future),
        };

        let outcome = future.await;
        self.complete_fetch(generation, ticket_id, outcome).await
    }

    fn plan_fetch(&self, force_refresh: bool) -> Plan {
        let mut state = self.lock();
        if state.breaker.is_suspended() {
            return Plan::Done(Err(SessionError::RefreshLoopSuspended));
        }
        let Some(credential) = state.session.credential.clone() else {
            return Plan::Done(Ok(None));
        };
        let generation = state.session.generation;

        let expired = state
            .session
            .claims
            .as_ref()
            .is_some_and(|c| c.is_expired_at(SystemTime::now()));
        if expired {
            return Plan::Expired(generation);
        }

        if !force_refresh {
            if let Some(profile) = state
                .session
                .fresh_profile(Instant::now(), self.inner.config.profile_ttl)
            {
                return Plan::Done(Ok(Some(profile.clone())));
            }
        }

        if let Some(ticket) = state.ticket.as_ref().filter(|t| t.generation == generation) {
            tracing::debug!(%generation, ticket = ticket.id, "joining in-flight fetch");
            return Plan::Await {
                generation,
                ticket_id: ticket.id,
                future: ticket.future.clone(),
            };
        }

        let id = state.next_ticket_id;
        state.next_ticket_id += 1;
        let future = fetch_with_retry(
            Arc::clone(&self.inner.fetcher),
            credential,
            self.inner.config.clone(),
        )
        .boxed()
        .shared();
        state.ticket = Some(FetchTicket {
            id,
            generation,
            future: future.clone(),
        });
        tracing::debug!(%generation, ticket = id, force_refresh, "starting profile fetch");

        Plan::Await {
            generation,
            ticket_id: id,
            future,
        }
    }

    async fn complete_fetch(
        &self,
        generation: Generation,
        ticket_id: u64,
        outcome: FetchOutcome,
    ) -> Result<Option<Profile>, SessionError> {
        let now = Instant::now();
        let completion = {
            let mut state = self.lock();
            let first = state.ticket.as_ref().is_some_and(|t| t.id == ticket_id);
            if first {
                state.ticket = None;
            }
            let current = state.session.generation == generation;

            match outcome {
                Ok(profile) if current => {
                    if first {
                        state.session.user_id = Some(profile.id.clone());
                        state.session.profile = Some(profile.clone());
                        state.session.fetched_at = Some(now);
                        Completion::Applied {
                            profile,
                            generation,
                            credential: state.session.credential.clone(),
                        }
                    } else {
                        Completion::Done(Ok(Some(profile)))
                    }
                }
                Err(FetchFailure {
                    error: FetchError::InvalidCredential,
                    ..
                }) if current => Completion::Rejected(generation),
                Err(FetchFailure { attempts, error }) if current => {
                    Completion::Done(Err(SessionError::ProfileUnavailable {
                        attempts,
                        last_error: error,
                        cached: state.session.profile.clone(),
                    }))
                }
                Err(FetchFailure {
                    error: FetchError::InvalidCredential,
                    ..
                }) if !state.session.is_authenticated() => {
                    // Another waiter on this ticket already signed out.
                    Completion::Done(Err(SessionError::InvalidCredential))
                }
                _ => {
                    tracing::debug!(
                        ticket_generation = %generation,
                        current_generation = %state.session.generation,
                        "discarding stale fetch result"
                    );
                    Completion::Done(Ok(state
                        .session
                        .fresh_profile(now, self.inner.config.profile_ttl)
                        .cloned()))
                }
            }
        };

        match completion {
            Completion::Done(result) => result,
            Completion::Applied {
                profile,
                generation,
                credential,
            } => {
                tracing::info!(
                    tab_id = %self.tab_id(),
                    %generation,
                    user_id = %profile.id,
                    "profile updated"
                );
                self.emit(SessionEvent::ProfileUpdated {
                    generation,
                    profile: profile.clone(),
                });
                self.publish(
                    MessageKind::ProfileUpdated,
                    generation,
                    &SessionPayload {
                        credential: credential.map(|c| c.as_str().to_owned()),
                        profile: Some(profile.clone()),
                    },
                );
                Ok(Some(profile))
            }
            Completion::Rejected(generation) => {
                tracing::warn!(tab_id = %self.tab_id(), %generation, "credential rejected");
                self.sign_out_if_current(generation, SignOutReason::InvalidCredential)
                    .await;
                Err(SessionError::InvalidCredential)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Local transitions
    // -----------------------------------------------------------------------

    /// Signs in with a raw bearer credential.
    ///
    /// Starts a new generation, drops any in-flight fetch and cached
    /// profile, mirrors the credential to storage (failures are logged, not
    /// returned), and announces `SIGNED_IN` to the other tabs. This is the
    /// only way out of a refresh-loop suspension.
    ///
    /// # Errors
    /// Returns [`SessionError::MalformedCredential`] if the credential
    /// cannot be decoded; the session is left untouched.
    pub async fn sign_in(&self, credential: impl Into<String>) -> Result<Generation, SessionError> {
        let credential = Credential::new(credential);
        let Some(claims) = credential.claims() else {
            tracing::warn!(tab_id = %self.tab_id(), %credential, "rejecting malformed credential");
            return Err(SessionError::MalformedCredential);
        };

        let (generation, user_id, resumed) = {
            let mut state = self.lock();
            let resumed = state.breaker.is_suspended();
            if resumed {
                state.breaker.resume();
            }
            let generation = state.session.generation.next();
            state
                .session
                .replace(generation, credential.clone(), claims, None);
            state.ticket = None;
            state.breaker.record_sign_in();
            (generation, state.session.user_id.clone(), resumed)
        };

        tracing::info!(
            tab_id = %self.tab_id(),
            %generation,
            %credential,
            user_id = user_id.as_deref().unwrap_or("-"),
            resumed,
            "signed in"
        );
        self.emit(SessionEvent::SignedIn {
            generation,
            user_id,
            remote: false,
        });
        self.persist().await;
        self.publish(
            MessageKind::SignedIn,
            generation,
            &SessionPayload {
                credential: Some(credential.as_str().to_owned()),
                profile: None,
            },
        );
        Ok(generation)
    }

    /// Signs out at the user's request. See
    /// [`sign_out_with_reason`](Self::sign_out_with_reason).
    pub async fn sign_out(&self) -> Result<Generation, SessionError> {
        self.sign_out_with_reason(SignOutReason::User).await
    }

    /// Ends the session: starts a new generation, clears the credential,
    /// profile, and in-flight fetch, clears storage, and announces
    /// `SIGNED_OUT`. Always succeeds, even when nobody was signed in.
    pub async fn sign_out_with_reason(
        &self,
        reason: SignOutReason,
    ) -> Result<Generation, SessionError> {
        let generation = {
            let mut state = self.lock();
            self.end_session(&mut state, reason)
        };
        self.after_sign_out(generation, reason).await;
        Ok(generation)
    }

    /// Signs out only if the session is still at `generation`.
    ///
    /// Used for decisions made about a particular session (an expired or
    /// rejected credential) that must not end a newer one. Returns whether
    /// the sign-out happened.
    pub async fn sign_out_if_current(&self, generation: Generation, reason: SignOutReason) -> bool {
        let next = {
            let mut state = self.lock();
            if state.session.generation != generation {
                None
            } else {
                Some(self.end_session(&mut state, reason))
            }
        };
        match next {
            Some(next) => {
                self.after_sign_out(next, reason).await;
                true
            }
            None => {
                tracing::debug!(%generation, %reason, "session already replaced, not signing out");
                false
            }
        }
    }

    fn end_session(&self, state: &mut State, reason: SignOutReason) -> Generation {
        let now = Instant::now();
        let generation = state.session.generation.next();
        state.session.clear();
        state.session.generation = generation;
        state.ticket = None;
        if state.breaker.record_sign_out(now) {
            let cycles = state.breaker.cycles_in_window(now);
            tracing::warn!(
                tab_id = %self.tab_id(),
                cycles,
                "refresh loop detected, suspending automatic refresh"
            );
            self.emit(SessionEvent::Suspended { cycles });
        }
        generation
    }

    async fn after_sign_out(&self, generation: Generation, reason: SignOutReason) {
        tracing::info!(tab_id = %self.tab_id(), %generation, %reason, "signed out");
        self.emit(SessionEvent::SignedOut { generation, reason });
        self.persist().await;
        self.publish(
            MessageKind::SignedOut,
            generation,
            &SessionPayload::default(),
        );
    }

    // -----------------------------------------------------------------------
    // Remote transitions
    // -----------------------------------------------------------------------

    /// Applies a session change announced by another tab.
    ///
    /// Ignores this tab's own echoes and anything not newer than the
    /// current generation, so applying the same message twice is a no-op.
    /// Nothing is persisted or re-broadcast: the originating tab has done
    /// both.
    ///
    /// Returns whether the message changed local state.
    pub fn apply_remote(&self, message: &BroadcastMessage) -> bool {
        if message.origin_tab_id == *self.tab_id() {
            return false;
        }
        let now = Instant::now();
        let generation = message.generation;
        if !generation.can_advance() {
            tracing::warn!(
                origin = %message.origin_tab_id,
                kind = %message.kind,
                "ignoring remote message at the final generation"
            );
            return false;
        }

        let event = {
            let mut state = self.lock();
            if generation <= state.session.generation {
                tracing::trace!(
                    kind = %message.kind,
                    %generation,
                    current = %state.session.generation,
                    "ignoring remote message that is not newer"
                );
                return false;
            }

            match message.kind {
                MessageKind::SignedOut => {
                    state.session.clear();
                    state.session.generation = generation;
                    state.ticket = None;
                    if state.breaker.record_sign_out(now) {
                        let cycles = state.breaker.cycles_in_window(now);
                        tracing::warn!(cycles, "refresh loop detected, suspending automatic refresh");
                        self.emit(SessionEvent::Suspended { cycles });
                    }
                    RemoteEvent::SignedOut
                }
                MessageKind::SignedIn | MessageKind::ProfileUpdated => {
                    let Some((credential, claims, profile)) = remote_identity(message) else {
                        return false;
                    };
                    let profile = profile.map(|p| (p, now));
                    let updated = profile.as_ref().map(|(p, _)| p.clone());
                    state.session.replace(generation, credential, claims, profile);
                    state.ticket = None;
                    state.breaker.record_sign_in();
                    RemoteEvent::SignedIn {
                        user_id: state.session.user_id.clone(),
                        profile: updated,
                    }
                }
            }
        };

        tracing::info!(
            tab_id = %self.tab_id(),
            origin = %message.origin_tab_id,
            kind = %message.kind,
            %generation,
            "applied remote session change"
        );
        match event {
            RemoteEvent::SignedOut => self.emit(SessionEvent::SignedOut {
                generation,
                reason: SignOutReason::Remote,
            }),
            RemoteEvent::SignedIn { user_id, profile } => {
                self.emit(SessionEvent::SignedIn {
                    generation,
                    user_id,
                    remote: true,
                });
                if let Some(profile) = profile {
                    self.emit(SessionEvent::ProfileUpdated {
                        generation,
                        profile,
                    });
                }
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    /// Picks up the session persisted by an earlier page load or another
    /// tab.
    ///
    /// Adopts the stored generation if it is newer. A store that cannot be
    /// read counts as "no session". An undecodable or expired credential
    /// is removed from storage.
    ///
    /// Returns whether a session was restored.
    ///
    /// # Errors
    /// Returns [`SessionError::RefreshLoopSuspended`] while the breaker is
    /// tripped: restoring is an automatic sign-in.
    pub async fn restore(&self) -> Result<bool, SessionError> {
        if self.is_suspended() {
            return Err(SessionError::RefreshLoopSuspended);
        }

        let stored_generation = match self.inner.store.get(GENERATION_KEY).await {
            Ok(value) => value.and_then(|v| v.trim().parse::<u64>().ok()).map(Generation),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read stored generation");
                None
            }
        };
        let raw = match self.inner.store.get(CREDENTIAL_KEY).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read stored credential, starting signed out");
                None
            }
        };

        let stored_generation = stored_generation.filter(|stored| {
            let usable = stored.can_advance();
            if !usable {
                tracing::warn!(%stored, "ignoring stored generation that cannot advance");
            }
            usable
        });
        if let Some(stored) = stored_generation {
            let mut state = self.lock();
            if stored > state.session.generation {
                state.session.generation = stored;
            }
        }

        let Some(raw) = raw else {
            return Ok(false);
        };
        let credential = Credential::new(raw);
        let claims = match credential.claims() {
            Some(claims) if !claims.is_expired_at(SystemTime::now()) => claims,
            claims => {
                tracing::info!(
                    %credential,
                    expired = claims.is_some(),
                    "discarding unusable stored credential"
                );
                self.discard_stored_credential().await;
                return Ok(false);
            }
        };

        let (generation, user_id) = {
            let mut state = self.lock();
            if state.breaker.is_suspended() {
                return Err(SessionError::RefreshLoopSuspended);
            }
            if state.session.is_authenticated() {
                tracing::debug!("session established while restoring, keeping it");
                return Ok(false);
            }
            let generation = state.session.generation;
            state.session.replace(generation, credential, claims, None);
            state.ticket = None;
            state.breaker.record_sign_in();
            (generation, state.session.user_id.clone())
        };

        tracing::info!(tab_id = %self.tab_id(), %generation, "session restored");
        self.emit(SessionEvent::SignedIn {
            generation,
            user_id,
            remote: true,
        });
        Ok(true)
    }

    /// Rewrites the durable mirror of the current session.
    ///
    /// Meant for page teardown, where the caller wants to know whether the
    /// write made it.
    ///
    /// # Errors
    /// Returns [`SessionError::StorageUnavailable`] if any write failed.
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.write_store().await?;
        Ok(())
    }

    /// Best-effort mirror write after a local transition.
    async fn persist(&self) {
        if let Err(e) = self.write_store().await {
            tracing::warn!(
                tab_id = %self.tab_id(),
                error = %e,
                "session storage write failed, continuing in memory"
            );
        }
    }

    /// Writes the state as it is once the write lock is held, so
    /// overlapping writers leave the store at the latest state.
    async fn write_store(&self) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let (generation, credential, claims) = {
            let state = self.lock();
            (
                state.session.generation,
                state.session.credential.clone(),
                state.session.claims.clone(),
            )
        };

        let store = &self.inner.store;
        store
            .set(GENERATION_KEY, &generation.0.to_string())
            .await?;
        match credential {
            Some(credential) => {
                store.set(CREDENTIAL_KEY, credential.as_str()).await?;
                match claims.map(|c| serde_json::to_string(&c)) {
                    Some(Ok(json)) => store.set(CLAIMS_KEY, &json).await?,
                    Some(Err(e)) => return Err(StoreError::Corrupt(e)),
                    None => store.remove(CLAIMS_KEY).await?,
                }
            }
            None => {
                store.remove(CREDENTIAL_KEY).await?;
                store.remove(CLAIMS_KEY).await?;
            }
        }
        tracing::debug!(%generation, "session mirrored to storage");
        Ok(())
    }

    async fn discard_stored_credential(&self) {
        let _guard = self.inner.write_lock.lock().await;
        for key in [CREDENTIAL_KEY, CLAIMS_KEY] {
            if let Err(e) = self.inner.store.remove(key).await {
                tracing::warn!(key, error = %e, "cannot remove stored credential");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// A copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn generation(&self) -> Generation {
        self.lock().session.generation
    }

    pub fn claims(&self) -> Option<Claims> {
        self.lock().session.claims.clone()
    }

    /// The last fetched profile, fresh or not.
    pub fn cached_profile(&self) -> Option<Profile> {
        self.lock().session.profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_authenticated()
    }

    /// Whether the refresh-loop breaker has tripped.
    pub fn is_suspended(&self) -> bool {
        self.lock().breaker.is_suspended()
    }

    pub fn tab_id(&self) -> &TabId {
        self.inner.broadcaster.tab_id()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Local session events. Slow receivers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    fn publish(&self, kind: MessageKind, generation: Generation, payload: &SessionPayload) {
        let message =
            match BroadcastMessage::session(kind, self.tab_id().clone(), generation, payload) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(%kind, error = %e, "cannot build broadcast message");
                    return;
                }
            };
        match self.inner.broadcaster.publish(&message) {
            Ok(listeners) => tracing::debug!(%kind, %generation, listeners, "broadcast sent"),
            Err(e) => tracing::warn!(%kind, error = %e, "broadcast failed"),
        }
    }
}

enum RemoteEvent {
    SignedOut,
    SignedIn {
        user_id: Option<String>,
        profile: Option<Profile>,
    },
}

/// Credential, claims, and optional profile carried by a remote sign-in.
fn remote_identity(message: &BroadcastMessage) -> Option<(Credential, Claims, Option<Profile>)> {
    let payload = match message.session_payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(kind = %message.kind, error = %e, "ignoring remote message with bad payload");
            return None;
        }
    };
    let Some(raw) = payload.credential else {
        tracing::warn!(kind = %message.kind, "ignoring remote sign-in without credential");
        return None;
    };
    let credential = Credential::new(raw);
    let Some(claims) = credential.claims() else {
        tracing::warn!(kind = %message.kind, %credential, "ignoring remote sign-in with malformed credential");
        return None;
    };
    Some((credential, claims, payload.profile))
}

/// Runs one logical fetch: up to `max_attempts` attempts, each bounded by
/// `attempt_timeout`, with capped exponential backoff in between. A
/// rejected credential ends the fetch immediately.
async fn fetch_with_retry<F: ProfileFetcher>(
    fetcher: Arc<F>,
    credential: Credential,
    config: CoordinatorConfig,
) -> FetchOutcome {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result =
            match tokio::time::timeout(config.attempt_timeout, fetcher.fetch_profile(&credential))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::TimedOut(config.attempt_timeout)),
            };

        match result {
            Ok(profile) => {
                tracing::debug!(attempt, "profile fetched");
                return Ok(profile);
            }
            Err(error) if !error.is_retryable() || attempt >= config.max_attempts => {
                tracing::warn!(attempt, %error, "profile fetch failed");
                return Err(FetchFailure {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) => {
                let delay = config.backoff_delay(attempt);
                tracing::warn!(attempt, %error, ?delay, "profile fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
