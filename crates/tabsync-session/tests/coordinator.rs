//! Integration tests for the session coordinator: caching, single-flight
//! fetches, generations, remote changes, storage, and the loop breaker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures_util::future::join_all;
use tabsync_protocol::{
    BroadcastMessage, Generation, MessageKind, Profile, SessionPayload, TabId,
};
use tabsync_session::{
    CREDENTIAL_KEY, CoordinatorConfig, FetchError, GENERATION_KEY, ProfileFetcher,
    SessionCoordinator, SessionError, SessionEvent, SignOutReason,
};
use tabsync_store::{MemoryStore, SessionStore};
use tabsync_transport::{Broadcaster, Frame, OriginBus};
use tokio::sync::broadcast;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

/// 2100-01-01, far enough to never expire during a test run.
const FAR_FUTURE: u64 = 4_102_444_800;

fn token(sub: &str, exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

fn valid_token(sub: &str) -> String {
    token(sub, FAR_FUTURE)
}

/// Fetcher that counts calls and plays back scripted results. Once the
/// script runs out it returns a profile whose id is the credential's `sub`.
#[derive(Clone, Default)]
struct MockFetcher {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Result<Profile, FetchError>>>>,
    delay: Duration,
}

impl MockFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn script(self, results: impl IntoIterator<Item = Result<Profile, FetchError>>) -> Self {
        self.script.lock().unwrap().extend(results);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProfileFetcher for MockFetcher {
    async fn fetch_profile(
        &self,
        credential: &tabsync_protocol::Credential,
    ) -> Result<Profile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let sub = credential
                .claims()
                .and_then(|c| c.sub)
                .unwrap_or_else(|| "anonymous".into());
            Ok(Profile::new(sub))
        })
    }
}

struct Harness {
    coordinator: SessionCoordinator<MemoryStore, MockFetcher>,
    fetcher: MockFetcher,
    store: MemoryStore,
    frames: broadcast::Receiver<Frame>,
}

fn harness_with(fetcher: MockFetcher, config: CoordinatorConfig) -> Harness {
    let bus = OriginBus::new("https://app.test");
    let frames = bus.listen();
    let store = MemoryStore::new();
    let coordinator = SessionCoordinator::new(
        store.clone(),
        fetcher.clone(),
        Broadcaster::new(TabId::new("tab-a"), bus),
        config,
    );
    Harness {
        coordinator,
        fetcher,
        store,
        frames,
    }
}

fn harness(fetcher: MockFetcher) -> Harness {
    harness_with(fetcher, CoordinatorConfig::default())
}

/// Every frame published so far, decoded.
fn published(frames: &mut broadcast::Receiver<Frame>) -> Vec<BroadcastMessage> {
    let mut out = Vec::new();
    while let Ok(frame) = frames.try_recv() {
        out.push(serde_json::from_slice(&frame).unwrap());
    }
    out
}

fn remote(kind: MessageKind, generation: u64, credential: Option<String>) -> BroadcastMessage {
    BroadcastMessage::session(
        kind,
        TabId::new("tab-b"),
        Generation(generation),
        &SessionPayload {
            credential,
            profile: None,
        },
    )
    .unwrap()
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// =========================================================================
// Profile cache and single-flight
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_get_profile_signed_out_returns_none_without_fetch() {
    let h = harness(MockFetcher::default());

    assert!(h.coordinator.get_profile(false).await.unwrap().is_none());
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_concurrent_callers_share_one_fetch() {
    let h = harness(MockFetcher::with_delay(Duration::from_millis(100)));
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    let results = join_all((0..5).map(|_| h.coordinator.get_profile(false))).await;

    assert_eq!(h.fetcher.calls(), 1);
    for result in results {
        assert_eq!(result.unwrap().unwrap().id, "u1");
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_forced_joins_in_flight_fetch() {
    let h = harness(MockFetcher::with_delay(Duration::from_millis(100)));
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    let (a, b) = tokio::join!(
        h.coordinator.get_profile(false),
        h.coordinator.get_profile(true)
    );

    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_ttl_boundary_refetches_after_expiry() {
    let config = CoordinatorConfig {
        profile_ttl: Duration::from_secs(60),
        ..CoordinatorConfig::default()
    };
    let h = harness_with(MockFetcher::default(), config);
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    h.coordinator.get_profile(false).await.unwrap();
    assert_eq!(h.fetcher.calls(), 1);

    tokio::time::advance(Duration::from_secs(60) - Duration::from_millis(1)).await;
    h.coordinator.get_profile(false).await.unwrap();
    assert_eq!(h.fetcher.calls(), 1, "still fresh 1 ms before the TTL");

    tokio::time::advance(Duration::from_millis(2)).await;
    h.coordinator.get_profile(false).await.unwrap();
    assert_eq!(h.fetcher.calls(), 2, "refetched 1 ms after the TTL");
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_force_refresh_bypasses_cache() {
    let h = harness(MockFetcher::default());
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    h.coordinator.get_profile(false).await.unwrap();
    h.coordinator.get_profile(true).await.unwrap();

    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_success_broadcasts_profile_updated() {
    let mut h = harness(MockFetcher::default());
    let credential = valid_token("u1");
    let generation = h.coordinator.sign_in(credential.clone()).await.unwrap();

    h.coordinator.get_profile(false).await.unwrap();

    let messages = published(&mut h.frames);
    let kinds: Vec<_> = messages.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MessageKind::SignedIn, MessageKind::ProfileUpdated]);

    let update = &messages[1];
    assert_eq!(update.generation, generation);
    let payload = update.session_payload().unwrap();
    assert_eq!(payload.credential.as_deref(), Some(credential.as_str()));
    assert_eq!(payload.profile.unwrap().id, "u1");
}

// =========================================================================
// Generations
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_get_profile_result_from_older_generation_is_discarded() {
    let h = harness(MockFetcher::with_delay(Duration::from_millis(100)));
    let g1 = h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    let pending = tokio::spawn({
        let coordinator = h.coordinator.clone();
        async move { coordinator.get_profile(false).await }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.fetcher.calls(), 1);

    h.coordinator.sign_out().await.unwrap();
    let g3 = h.coordinator.sign_in(valid_token("u2")).await.unwrap();
    assert_eq!(g3.0, g1.0 + 2);

    let result = pending.await.unwrap().unwrap();

    assert!(result.is_none(), "stale profile must not be returned");
    assert!(h.coordinator.cached_profile().is_none());
    assert_eq!(h.coordinator.snapshot().user_id.as_deref(), Some("u2"));
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_and_sign_out_bump_generation() {
    let h = harness(MockFetcher::default());
    assert_eq!(h.coordinator.generation(), Generation::ZERO);

    assert_eq!(h.coordinator.sign_in(valid_token("u1")).await.unwrap(), Generation(1));
    assert_eq!(h.coordinator.sign_out().await.unwrap(), Generation(2));
    assert_eq!(h.coordinator.sign_out().await.unwrap(), Generation(3));
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_malformed_credential_leaves_state_unchanged() {
    let h = harness(MockFetcher::default());

    let err = h.coordinator.sign_in("not-a-token").await.unwrap_err();

    assert!(matches!(err, SessionError::MalformedCredential));
    assert_eq!(h.coordinator.generation(), Generation::ZERO);
    assert!(!h.coordinator.is_authenticated());
    assert!(h.store.is_empty());
}

// =========================================================================
// Remote changes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_apply_remote_sign_in_is_idempotent() {
    let h = harness(MockFetcher::default());
    let message = remote(MessageKind::SignedIn, 5, Some(valid_token("u9")));

    assert!(h.coordinator.apply_remote(&message));
    assert!(!h.coordinator.apply_remote(&message));

    assert_eq!(h.coordinator.generation(), Generation(5));
    assert_eq!(h.coordinator.snapshot().user_id.as_deref(), Some("u9"));
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_final_generation_is_ignored() {
    let h = harness(MockFetcher::default());
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    assert!(!h.coordinator.apply_remote(&remote(MessageKind::SignedOut, u64::MAX, None)));
    assert!(
        !h.coordinator
            .apply_remote(&remote(MessageKind::SignedIn, u64::MAX, Some(valid_token("u2"))))
    );
    assert!(h.coordinator.is_authenticated());
    assert_eq!(h.coordinator.generation(), Generation(1));

    let signed_out = h.coordinator.sign_out().await.unwrap();
    let signed_in = h.coordinator.sign_in(valid_token("u1")).await.unwrap();
    assert_eq!(signed_out, Generation(2));
    assert_eq!(signed_in, Generation(3));
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_older_messages_are_ignored() {
    let h = harness(MockFetcher::default());
    h.coordinator
        .apply_remote(&remote(MessageKind::SignedIn, 5, Some(valid_token("u1"))));

    assert!(!h.coordinator.apply_remote(&remote(MessageKind::SignedOut, 4, None)));
    assert!(!h.coordinator.apply_remote(&remote(MessageKind::SignedOut, 5, None)));
    assert!(
        !h.coordinator
            .apply_remote(&remote(MessageKind::SignedIn, 3, Some(valid_token("u2"))))
    );

    assert!(h.coordinator.is_authenticated());
    assert_eq!(h.coordinator.snapshot().user_id.as_deref(), Some("u1"));
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_newer_sign_out_clears_and_adopts_generation() {
    let h = harness(MockFetcher::default());
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();
    h.coordinator.get_profile(false).await.unwrap();
    let mut events = h.coordinator.subscribe();

    assert!(h.coordinator.apply_remote(&remote(MessageKind::SignedOut, 7, None)));

    assert!(!h.coordinator.is_authenticated());
    assert!(h.coordinator.cached_profile().is_none());
    assert_eq!(h.coordinator.generation(), Generation(7));
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::SignedOut {
            generation: Generation(7),
            reason: SignOutReason::Remote,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_own_echo_is_ignored() {
    let h = harness(MockFetcher::default());
    let mut echo = remote(MessageKind::SignedOut, 9, None);
    echo.origin_tab_id = h.coordinator.tab_id().clone();

    assert!(!h.coordinator.apply_remote(&echo));
    assert_eq!(h.coordinator.generation(), Generation::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_profile_update_is_served_from_cache() {
    let h = harness(MockFetcher::default());
    let message = BroadcastMessage::session(
        MessageKind::ProfileUpdated,
        TabId::new("tab-b"),
        Generation(3),
        &SessionPayload {
            credential: Some(valid_token("u1")),
            profile: Some(Profile::new("u1")),
        },
    )
    .unwrap();

    assert!(h.coordinator.apply_remote(&message));
    let profile = h.coordinator.get_profile(false).await.unwrap().unwrap();

    assert_eq!(profile.id, "u1");
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_profile_update_at_same_generation_is_ignored() {
    let h = harness(MockFetcher::default());
    let generation = h.coordinator.sign_in(valid_token("u1")).await.unwrap();
    let message = BroadcastMessage::session(
        MessageKind::ProfileUpdated,
        TabId::new("tab-b"),
        generation,
        &SessionPayload {
            credential: Some(valid_token("u1")),
            profile: Some(Profile::new("u1")),
        },
    )
    .unwrap();

    assert!(!h.coordinator.apply_remote(&message));
    assert!(h.coordinator.cached_profile().is_none());
    h.coordinator.get_profile(false).await.unwrap();
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_sign_in_with_bad_credential_is_rejected() {
    let h = harness(MockFetcher::default());

    assert!(!h.coordinator.apply_remote(&remote(MessageKind::SignedIn, 2, None)));
    assert!(
        !h.coordinator
            .apply_remote(&remote(MessageKind::SignedIn, 2, Some("garbage".into())))
    );
    assert_eq!(h.coordinator.generation(), Generation::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_apply_remote_does_not_persist_or_rebroadcast() {
    let mut h = harness(MockFetcher::default());

    h.coordinator
        .apply_remote(&remote(MessageKind::SignedIn, 2, Some(valid_token("u1"))));

    assert!(h.store.is_empty());
    assert!(published(&mut h.frames).is_empty());
}

// =========================================================================
// Fetch failures
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_get_profile_retries_with_backoff_then_succeeds() {
    let fetcher = MockFetcher::default().script([
        Err(FetchError::Failed("503".into())),
        Err(FetchError::Failed("503".into())),
    ]);
    let h = harness(fetcher);
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();
    let started = Instant::now();

    let profile = h.coordinator.get_profile(false).await.unwrap().unwrap();

    assert_eq!(profile.id, "u1");
    assert_eq!(h.fetcher.calls(), 3);
    // 250 ms after the first failure, 500 ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_exhausted_returns_stale_profile() {
    let fetcher = MockFetcher::default().script([
        Ok(Profile::new("u1")),
        Err(FetchError::Failed("down".into())),
        Err(FetchError::Failed("down".into())),
        Err(FetchError::Failed("down".into())),
    ]);
    let h = harness(fetcher);
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();
    h.coordinator.get_profile(false).await.unwrap();

    let err = h.coordinator.get_profile(true).await.unwrap_err();

    match &err {
        SessionError::ProfileUnavailable {
            attempts,
            last_error,
            cached,
        } => {
            assert_eq!(*attempts, 3);
            assert_eq!(*last_error, FetchError::Failed("down".into()));
            assert_eq!(cached.as_ref().map(|p| p.id.as_str()), Some("u1"));
        }
        other => panic!("expected ProfileUnavailable, got {other:?}"),
    }
    assert!(err.cached_profile().is_some());
    assert!(h.coordinator.is_authenticated(), "transient failures keep the session");
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_attempt_timeout_counts_as_failure() {
    let config = CoordinatorConfig {
        max_attempts: 2,
        attempt_timeout: Duration::from_secs(1),
        ..CoordinatorConfig::default()
    };
    let h = harness_with(MockFetcher::with_delay(Duration::from_secs(30)), config);
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    let err = h.coordinator.get_profile(false).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::ProfileUnavailable {
            attempts: 2,
            last_error: FetchError::TimedOut(_),
            cached: None,
        }
    ));
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_invalid_credential_signs_out_without_retry() {
    let fetcher = MockFetcher::default().script([Err(FetchError::InvalidCredential)]);
    let mut h = harness(fetcher);
    let mut events = h.coordinator.subscribe();
    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    let err = h.coordinator.get_profile(false).await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidCredential));
    assert!(err.requires_user_action());
    assert_eq!(h.fetcher.calls(), 1);
    assert!(!h.coordinator.is_authenticated());
    assert!(h.store.snapshot().get(CREDENTIAL_KEY).is_none());

    let kinds: Vec<_> = published(&mut h.frames).iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MessageKind::SignedIn, MessageKind::SignedOut]);
    assert!(drain(&mut events).contains(&SessionEvent::SignedOut {
        generation: Generation(2),
        reason: SignOutReason::InvalidCredential,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_expired_claims_sign_out() {
    let h = harness(MockFetcher::default());
    // Expired in 2001.
    h.coordinator.sign_in(token("u1", 1_000_000_000)).await.unwrap();

    let err = h.coordinator.get_profile(false).await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidCredential));
    assert_eq!(h.fetcher.calls(), 0);
    assert!(!h.coordinator.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_get_profile_unrepresentable_exp_never_expires() {
    let h = harness(MockFetcher::default());
    h.coordinator.sign_in(token("u1", u64::MAX)).await.unwrap();

    let profile = h.coordinator.get_profile(false).await.unwrap();

    assert_eq!(profile.map(|p| p.id).as_deref(), Some("u1"));
    assert!(h.coordinator.is_authenticated());
    assert_eq!(h.fetcher.calls(), 1);
}

// =========================================================================
// Refresh-loop breaker
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_breaker_five_cycles_suspend_refresh_until_sign_in() {
    let h = harness(MockFetcher::default());
    let mut events = h.coordinator.subscribe();

    for _ in 0..5 {
        h.coordinator.sign_in(valid_token("u1")).await.unwrap();
        h.coordinator.sign_out().await.unwrap();
    }

    assert!(h.coordinator.is_suspended());
    assert!(drain(&mut events).contains(&SessionEvent::Suspended { cycles: 5 }));

    // Remote sign-in is applied but doesn't lift the suspension.
    let generation = h.coordinator.generation().0 + 1;
    h.coordinator
        .apply_remote(&remote(MessageKind::SignedIn, generation, Some(valid_token("u1"))));
    assert!(matches!(
        h.coordinator.get_profile(true).await,
        Err(SessionError::RefreshLoopSuspended)
    ));
    assert!(matches!(
        h.coordinator.restore().await,
        Err(SessionError::RefreshLoopSuspended)
    ));
    assert_eq!(h.fetcher.calls(), 0);

    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    assert!(!h.coordinator.is_suspended());
    assert!(h.coordinator.get_profile(false).await.unwrap().is_some());
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_slow_cycles_never_trip() {
    let h = harness(MockFetcher::default());

    for _ in 0..10 {
        h.coordinator.sign_in(valid_token("u1")).await.unwrap();
        h.coordinator.sign_out().await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
    }

    assert!(!h.coordinator.is_suspended());
}

// =========================================================================
// Storage
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sign_in_mirrors_credential_and_generation() {
    let h = harness(MockFetcher::default());
    let credential = valid_token("u1");

    h.coordinator.sign_in(credential.clone()).await.unwrap();

    let stored = h.store.snapshot();
    assert_eq!(stored.get(CREDENTIAL_KEY), Some(&credential));
    assert_eq!(stored.get(GENERATION_KEY).map(String::as_str), Some("1"));
    assert!(stored.contains_key(tabsync_session::CLAIMS_KEY));

    h.coordinator.sign_out().await.unwrap();

    let stored = h.store.snapshot();
    assert!(!stored.contains_key(CREDENTIAL_KEY));
    assert_eq!(stored.get(GENERATION_KEY).map(String::as_str), Some("2"));
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_storage_unavailable_is_not_fatal() {
    let h = harness(MockFetcher::default());
    h.store.set_available(false);

    h.coordinator.sign_in(valid_token("u1")).await.unwrap();

    assert!(h.coordinator.is_authenticated());
    assert!(h.coordinator.get_profile(false).await.unwrap().is_some());
    assert!(matches!(
        h.coordinator.flush().await,
        Err(SessionError::StorageUnavailable(_))
    ));

    h.store.set_available(true);
    h.coordinator.flush().await.unwrap();
    assert!(h.store.snapshot().contains_key(CREDENTIAL_KEY));
}

#[tokio::test(start_paused = true)]
async fn test_restore_adopts_stored_session_and_generation() {
    let h = harness(MockFetcher::default());
    h.store.set(CREDENTIAL_KEY, &valid_token("u1")).await.unwrap();
    h.store.set(GENERATION_KEY, "7").await.unwrap();
    let mut events = h.coordinator.subscribe();

    assert!(h.coordinator.restore().await.unwrap());

    assert_eq!(h.coordinator.generation(), Generation(7));
    assert_eq!(h.coordinator.snapshot().user_id.as_deref(), Some("u1"));
    assert_eq!(h.fetcher.calls(), 0);
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::SignedIn {
            generation: Generation(7),
            user_id: Some("u1".into()),
            remote: true,
        }]
    );

    // The next local sign-in continues from the stored epoch.
    assert_eq!(h.coordinator.sign_in(valid_token("u2")).await.unwrap(), Generation(8));
}

#[tokio::test(start_paused = true)]
async fn test_restore_expired_credential_is_removed() {
    let h = harness(MockFetcher::default());
    h.store.set(CREDENTIAL_KEY, &token("u1", 1_000_000_000)).await.unwrap();
    h.store.set(GENERATION_KEY, "3").await.unwrap();

    assert!(!h.coordinator.restore().await.unwrap());

    assert!(!h.coordinator.is_authenticated());
    assert_eq!(h.coordinator.generation(), Generation(3));
    assert!(h.store.snapshot().get(CREDENTIAL_KEY).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_restore_unrepresentable_exp_is_kept() {
    let h = harness(MockFetcher::default());
    h.store.set(CREDENTIAL_KEY, &token("u1", u64::MAX)).await.unwrap();

    assert!(h.coordinator.restore().await.unwrap());
    assert!(h.coordinator.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_restore_final_generation_is_not_adopted() {
    let h = harness(MockFetcher::default());
    h.store.set(CREDENTIAL_KEY, &valid_token("u1")).await.unwrap();
    h.store.set(GENERATION_KEY, &u64::MAX.to_string()).await.unwrap();

    assert!(h.coordinator.restore().await.unwrap());
    assert_eq!(h.coordinator.generation(), Generation::ZERO);

    let signed_in = h.coordinator.sign_in(valid_token("u2")).await.unwrap();
    let signed_out = h.coordinator.sign_out().await.unwrap();
    assert_eq!(signed_in, Generation(1));
    assert_ne!(signed_in, signed_out);
}

#[tokio::test(start_paused = true)]
async fn test_restore_unreadable_store_starts_signed_out() {
    let h = harness(MockFetcher::default());
    h.store.set(CREDENTIAL_KEY, &valid_token("u1")).await.unwrap();
    h.store.set_available(false);

    assert!(!h.coordinator.restore().await.unwrap());
    assert!(!h.coordinator.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_restore_empty_store_returns_false() {
    let h = harness(MockFetcher::default());

    assert!(!h.coordinator.restore().await.unwrap());
    assert_eq!(h.coordinator.generation(), Generation::ZERO);
}
