//! Refresh-loop breaker.
//!
//! A misbehaving backend (or two tabs disagreeing about a credential) can
//! make a session flap: sign in, get rejected, sign out, restore, sign in
//! again. The breaker counts completed sign-in→sign-out cycles in a
//! sliding window and, once there are too many, suspends automatic
//! refreshes until the user signs in explicitly.

use std::collections::VecDeque;

use tokio::time::Instant;

use crate::BreakerConfig;

#[derive(Debug)]
pub(crate) struct LoopBreaker {
    config: BreakerConfig,
    /// When each recent cycle completed, oldest first.
    cycles: VecDeque<Instant>,
    /// A sign-in happened since the last counted sign-out.
    signed_in: bool,
    suspended: bool,
}

impl LoopBreaker {
    pub(crate) fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            cycles: VecDeque::new(),
            signed_in: false,
            suspended: false,
        }
    }

    pub(crate) fn record_sign_in(&mut self) {
        self.signed_in = true;
    }

    /// Records a sign-out. Only closes a cycle if a sign-in preceded it.
    ///
    /// Returns `true` if this call tripped the breaker.
    pub(crate) fn record_sign_out(&mut self, now: Instant) -> bool {
        if !std::mem::take(&mut self.signed_in) {
            return false;
        }
        self.cycles.push_back(now);
        self.prune(now);

        if !self.suspended && self.cycles.len() > self.config.max_cycles as usize {
            self.suspended = true;
            return true;
        }
        false
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Lifts a suspension and forgets the cycle history.
    pub(crate) fn resume(&mut self) {
        self.suspended = false;
        self.cycles.clear();
    }

    pub(crate) fn cycles_in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.cycles.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.cycles.front() {
            if now.duration_since(oldest) > self.config.window {
                self.cycles.pop_front();
            } else {
                break;
            }
        }
    }
}
