//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabsync_protocol::millis;

/// How long a fetched profile stays fresh, and how fetches are retried.
///
/// Durations are (de)serialized as milliseconds:
///
/// ```json
/// { "profile_ttl_ms": 300000, "max_attempts": 3, "backoff_base_ms": 250,
///   "backoff_cap_ms": 2000, "attempt_timeout_ms": 10000,
///   "breaker": { "max_cycles": 4, "window_ms": 30000 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long a fetched profile is served from cache.
    #[serde(rename = "profile_ttl_ms", with = "millis")]
    pub profile_ttl: Duration,

    /// Fetch attempts per logical fetch, first attempt included.
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubles after each failure.
    #[serde(rename = "backoff_base_ms", with = "millis")]
    pub backoff_base: Duration,

    /// Upper bound on the delay between attempts.
    #[serde(rename = "backoff_cap_ms", with = "millis")]
    pub backoff_cap: Duration,

    /// Each attempt is abandoned (and counted as failed) after this long.
    #[serde(rename = "attempt_timeout_ms", with = "millis")]
    pub attempt_timeout: Duration,

    pub breaker: BreakerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            profile_ttl: Duration::from_secs(5 * 60),
            max_attempts: 3,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(10),
            breaker: BreakerConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Hard cap on `max_attempts`.
    pub const MAX_ATTEMPTS: u32 = 10;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`SessionCoordinator::new`](crate::SessionCoordinator::new).
    /// - `max_attempts` clamped to `1..=MAX_ATTEMPTS`.
    /// - `backoff_cap` raised to at least `backoff_base`.
    /// - `attempt_timeout` at least 1 ms.
    pub fn validated(mut self) -> Self {
        if self.max_attempts == 0 || self.max_attempts > Self::MAX_ATTEMPTS {
            tracing::warn!(
                max_attempts = self.max_attempts,
                "max_attempts out of range, clamping"
            );
            self.max_attempts = self.max_attempts.clamp(1, Self::MAX_ATTEMPTS);
        }
        if self.backoff_cap < self.backoff_base {
            self.backoff_cap = self.backoff_base;
        }
        if self.attempt_timeout.is_zero() {
            self.attempt_timeout = Duration::from_millis(1);
        }
        self.breaker = self.breaker.validated();
        self
    }

    /// Delay to wait after `failed_attempts` consecutive failures
    /// (1-based): `base * 2^(n-1)`, capped.
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1u32 << exp)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap)
    }
}

/// Refresh-loop breaker tuning.
///
/// The coordinator suspends automatic refreshes once more than
/// `max_cycles` sign-in→sign-out cycles complete within `window`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub max_cycles: u32,

    #[serde(rename = "window_ms", with = "millis")]
    pub window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_cycles: 4,
            window: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// `max_cycles` is at least 1.
    pub fn validated(mut self) -> Self {
        self.max_cycles = self.max_cycles.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.profile_ttl, Duration::from_secs(300));
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.breaker.max_cycles, 4);
        assert_eq!(cfg.breaker.window, Duration::from_secs(30));
    }

    #[test]
    fn test_validated_clamps_attempts_and_cap() {
        let cfg = CoordinatorConfig {
            max_attempts: 0,
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(1),
            attempt_timeout: Duration::ZERO,
            breaker: BreakerConfig {
                max_cycles: 0,
                ..BreakerConfig::default()
            },
            ..CoordinatorConfig::default()
        }
        .validated();

        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.backoff_cap, Duration::from_secs(5));
        assert_eq!(cfg.attempt_timeout, Duration::from_millis(1));
        assert_eq!(cfg.breaker.max_cycles, 1);

        let cfg = CoordinatorConfig {
            max_attempts: 99,
            ..CoordinatorConfig::default()
        }
        .validated();
        assert_eq!(cfg.max_attempts, CoordinatorConfig::MAX_ATTEMPTS);
    }

    #[test]
    fn test_backoff_delay_doubles_then_caps() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.backoff_delay(1), Duration::from_millis(250));
        assert_eq!(cfg.backoff_delay(2), Duration::from_millis(500));
        assert_eq!(cfg.backoff_delay(3), Duration::from_millis(1000));
        assert_eq!(cfg.backoff_delay(4), Duration::from_millis(2000));
        assert_eq!(cfg.backoff_delay(5), Duration::from_millis(2000));
        assert_eq!(cfg.backoff_delay(40), Duration::from_millis(2000));
    }

    #[test]
    fn test_config_from_json_uses_millis_and_defaults() {
        let cfg: CoordinatorConfig =
            serde_json::from_str(r#"{"profile_ttl_ms":1500,"breaker":{"window_ms":10000}}"#)
                .unwrap();

        assert_eq!(cfg.profile_ttl, Duration::from_millis(1500));
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.breaker.window, Duration::from_secs(10));
        assert_eq!(cfg.breaker.max_cycles, 4);
    }
}
