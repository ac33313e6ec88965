use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures_util::future::join_all;
use tabsync::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Identity provider stand-in
// ---------------------------------------------------------------------------

/// Answers after a short delay, like a real profile endpoint would.
#[derive(Clone, Default)]
struct SlowProvider {
    calls: Arc<AtomicUsize>,
}

impl ProfileFetcher for SlowProvider {
    async fn fetch_profile(&self, credential: &Credential) -> Result<Profile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sub = credential
            .claims()
            .and_then(|claims| claims.sub)
            .ok_or(FetchError::InvalidCredential)?;
        let mut profile = Profile::new(sub);
        profile.role = Some("customer".into());
        Ok(profile)
    }
}

/// An unsigned token for `sub`, valid until 2100.
fn demo_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}","exp":4102444800}}"#));
    format!("{header}.{payload}.demo")
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// What the scenario observed, for the closing log line and the tests.
#[derive(Debug, PartialEq, Eq)]
struct Summary {
    fetches: usize,
    tab_b_saw_sign_in: bool,
    tab_b_saw_sign_out: bool,
    final_generation: u64,
}

async fn run(config: TabsyncConfig) -> Result<Summary, TabsyncError> {
    let store = MemoryStore::new();
    let provider = SlowProvider::default();
    let bus = config.origin_bus("https://shop.example");

    let tab_a = TabContextBuilder::new()
        .tab_id(TabId::new("tab-a"))
        .config(config.clone())
        .build(store.clone(), provider.clone(), bus.clone())
        .await?;
    let tab_b = TabContextBuilder::new()
        .tab_id(TabId::new("tab-b"))
        .config(config)
        .build(store, provider.clone(), bus)
        .await?;

    tab_a.coordinator().sign_in(demo_token("ada")).await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let tab_b_saw_sign_in = tab_b.coordinator().is_authenticated();
    tracing::info!(tab_b_saw_sign_in, "tab-a signed in");

    // Five components asking at once share one fetch.
    let reads = (0..5).map(|_| tab_a.coordinator().get_profile(false));
    for profile in join_all(reads).await {
        if let Some(profile) = profile? {
            tracing::debug!(user_id = %profile.id, "profile read");
        }
    }

    // The page sleeps and wakes up; the cached profile is not trusted.
    tab_a.signal(LifecycleSignal::Hidden);
    tokio::time::sleep(Duration::from_secs(1)).await;
    tab_a.signal(LifecycleSignal::Freeze);
    tab_a.signal(LifecycleSignal::Resume);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let generation = tab_b.coordinator().sign_out().await?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let tab_b_saw_sign_out = !tab_a.coordinator().is_authenticated();
    tracing::info!(%generation, tab_b_saw_sign_out, "tab-b signed out");

    tab_a.shutdown().await?;
    tab_b.shutdown().await?;

    Ok(Summary {
        fetches: provider.calls.load(Ordering::SeqCst),
        tab_b_saw_sign_in,
        tab_b_saw_sign_out,
        final_generation: generation.0,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TabsyncConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => TabsyncConfig::default(),
    };

    let summary = run(config).await?;
    tracing::info!(?summary, "two-tab demo finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_two_tabs_stay_in_sync() {
        let mut config = TabsyncConfig::default();
        config.watchdog.enabled = false;

        let summary = run(config).await.unwrap();

        assert_eq!(
            summary,
            Summary {
                // One shared fetch for the five reads, one forced on resume.
                fetches: 2,
                tab_b_saw_sign_in: true,
                tab_b_saw_sign_out: true,
                final_generation: 2,
            }
        );
    }

    #[test]
    fn test_demo_token_decodes() {
        let claims = Credential::new(demo_token("ada")).claims().unwrap();
        assert_eq!(claims.sub.as_deref(), Some("ada"));
    }
}
