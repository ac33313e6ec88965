//! Watchdog configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabsync_protocol::millis;

/// How often the watchdog audits the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Time between audits.
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,

    /// Random extra delay (0..=this) before the first audit, so tabs opened
    /// together don't audit in lockstep.
    #[serde(rename = "initial_jitter_ms", with = "millis")]
    pub initial_jitter: Duration,

    /// `false` disables the periodic timer. `audit_now` still works.
    pub enabled: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_jitter: Duration::from_secs(5),
            enabled: true,
        }
    }
}

impl WatchdogConfig {
    /// Shortest allowed interval.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`Watchdog::spawn`](crate::Watchdog::spawn).
    /// - `interval` raised to at least [`Self::MIN_INTERVAL`].
    /// - `initial_jitter` capped at `interval`.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            tracing::warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "watchdog interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        self
    }

    /// Interval for the timer, or `None` when the timer is disabled.
    pub fn timer_interval(&self) -> Option<Duration> {
        self.enabled.then_some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = WatchdogConfig::default();
        assert_eq!(cfg.interval, Duration::from_secs(60));
        assert!(cfg.enabled);
        assert_eq!(cfg.timer_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_validated_clamps_interval_and_jitter() {
        let cfg = WatchdogConfig {
            interval: Duration::from_millis(10),
            initial_jitter: Duration::from_secs(30),
            enabled: true,
        }
        .validated();

        assert_eq!(cfg.interval, WatchdogConfig::MIN_INTERVAL);
        assert_eq!(cfg.initial_jitter, WatchdogConfig::MIN_INTERVAL);
    }

    #[test]
    fn test_disabled_has_no_timer() {
        let cfg = WatchdogConfig {
            enabled: false,
            ..WatchdogConfig::default()
        };
        assert_eq!(cfg.timer_interval(), None);
    }

    #[test]
    fn test_config_from_json() {
        let cfg: WatchdogConfig =
            serde_json::from_str(r#"{"interval_ms":15000,"enabled":false}"#).unwrap();
        assert_eq!(cfg.interval, Duration::from_secs(15));
        assert_eq!(cfg.initial_jitter, Duration::from_secs(5));
        assert!(!cfg.enabled);
    }
}
