//! Fixed-interval audit timer.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::WatchdogConfig;

/// Information about a fired tick, returned by
/// [`AuditScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if the tick fired late, e.g. because the previous audit was
    /// still retrying a fetch.
    pub overrun: bool,
    /// Whole intervals skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Fires once per interval.
///
/// Overruns never cause a burst of catch-up ticks: the next tick is
/// always scheduled a full interval after the late one.
///
/// When the timer is disabled or paused, [`wait_for_tick`] pends forever,
/// so it can sit in a `tokio::select!` next to a command channel:
///
/// ```ignore
/// loop {
///     tokio::select! {
///         Some(cmd) = commands.recv() => { /* pause, resume, audit now */ }
///         _ = scheduler.wait_for_tick() => { audit(&coordinator).await; }
///     }
/// }
/// ```
///
/// [`wait_for_tick`]: AuditScheduler::wait_for_tick
#[derive(Debug)]
pub struct AuditScheduler {
    interval: Option<Duration>,
    next_tick: Option<Instant>,
    tick_count: u64,
    overruns: u64,
    paused: bool,
}

impl AuditScheduler {
    /// The first tick is one interval plus a random share of
    /// `initial_jitter` away.
    pub fn new(config: &WatchdogConfig) -> Self {
        let interval = config.timer_interval();
        let next_tick = interval.map(|d| {
            let jitter_ms = config.initial_jitter.as_millis() as u64;
            let jitter = if jitter_ms > 0 {
                Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
            } else {
                Duration::ZERO
            };
            Instant::now() + d + jitter
        });

        match interval {
            Some(d) => debug!(interval_ms = d.as_millis() as u64, "audit timer created"),
            None => debug!("audit timer disabled"),
        }

        Self {
            interval,
            next_tick,
            tick_count: 0,
            overruns: 0,
            paused: false,
        }
    }

    /// Waits until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0;
        if overrun {
            self.overruns += 1;
            ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_millis() as u64,
                    "audit overrun, skipping ahead"
                );
            }
        }
        self.next_tick = Some(now + interval);

        trace!(tick = self.tick_count, overrun, "audit tick");
        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "audit timer paused");
        }
    }

    /// Resumes ticking, one full interval from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.interval {
                self.next_tick = Some(Instant::now() + interval);
            }
            debug!(tick = self.tick_count, "audit timer resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_secs: u64) -> WatchdogConfig {
        WatchdogConfig {
            interval: Duration::from_secs(interval_secs),
            initial_jitter: Duration::ZERO,
            enabled: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_tick_fires_each_interval() {
        let mut scheduler = AuditScheduler::new(&config(60));
        let start = Instant::now();

        let first = scheduler.wait_for_tick().await;
        assert_eq!(first.tick, 1);
        assert!(!first.overrun);
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        let second = scheduler.wait_for_tick().await;
        assert_eq!(second.tick, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_tick_jitter_delays_first_tick_within_bound() {
        let cfg = WatchdogConfig {
            initial_jitter: Duration::from_secs(5),
            ..config(60)
        };
        let mut scheduler = AuditScheduler::new(&cfg);
        let start = Instant::now();

        scheduler.wait_for_tick().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60));
        assert!(elapsed <= Duration::from_secs(65));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_tick_overrun_skips_ahead() {
        let mut scheduler = AuditScheduler::new(&config(10));
        scheduler.wait_for_tick().await;

        // Simulate a slow audit: 35 s spent after the first tick.
        time::advance(Duration::from_secs(35)).await;
        let late = scheduler.wait_for_tick().await;

        assert!(late.overrun);
        assert_eq!(late.ticks_skipped, 2);
        assert_eq!(scheduler.overruns(), 1);

        let start = Instant::now();
        let next = scheduler.wait_for_tick().await;
        assert!(!next.overrun);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_prevents_ticks_and_resume_restarts_interval() {
        let mut scheduler = AuditScheduler::new(&config(1));
        scheduler.pause();
        scheduler.pause();
        assert!(scheduler.is_paused());

        let result =
            time::timeout(Duration::from_secs(10), scheduler.wait_for_tick()).await;
        assert!(result.is_err(), "paused scheduler must not tick");

        scheduler.resume();
        let start = Instant::now();
        let tick = scheduler.wait_for_tick().await;
        assert_eq!(tick.tick, 1);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_scheduler_never_ticks() {
        let cfg = WatchdogConfig {
            enabled: false,
            ..config(1)
        };
        let mut scheduler = AuditScheduler::new(&cfg);
        assert!(!scheduler.is_enabled());

        let result =
            time::timeout(Duration::from_secs(3600), scheduler.wait_for_tick()).await;
        assert!(result.is_err());
        assert_eq!(scheduler.tick_count(), 0);
    }
}
