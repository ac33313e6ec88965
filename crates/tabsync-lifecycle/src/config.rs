//! Lifecycle configuration and state machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabsync_protocol::millis;

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

/// Settings shared by every consumer that doesn't override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long the page must stay hidden before consumers hear about it.
    #[serde(rename = "debounce_delay_ms", with = "millis")]
    pub debounce_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals and states
// ---------------------------------------------------------------------------

/// A raw notification from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    /// The page lost visibility.
    Hidden,
    /// The page became visible again.
    Visible,
    /// The page was frozen (backgrounded, discarded from the CPU).
    Freeze,
    /// A frozen page was resumed.
    Resume,
    Focus,
    Blur,
    /// The page is being torn down.
    Terminate,
}

/// The lifecycle state of the page.
///
/// ```text
///            Hidden                Freeze
///   Active ─────────→ Hidden ──────────────┐
///     ↑  ←─────────     │                  ↓
///     │    Visible      └─ Freeze ──→   Frozen
///     └─────────────── Resume ─────────────┘
///
///   any ── Terminate ──→ Terminated (absorbing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Active,
    Hidden,
    Frozen,
    Terminated,
}

impl LifecycleState {
    /// The state `signal` leads to, or `None` if the signal is ignored in
    /// this state. `Focus` and `Blur` never change state.
    pub fn apply(self, signal: LifecycleSignal) -> Option<Self> {
        use LifecycleSignal as S;
        match (self, signal) {
            (Self::Terminated, _) => None,
            (_, S::Terminate) => Some(Self::Terminated),
            (Self::Active, S::Hidden) => Some(Self::Hidden),
            (Self::Hidden, S::Visible) => Some(Self::Active),
            (Self::Active | Self::Hidden, S::Freeze) => Some(Self::Frozen),
            (Self::Frozen, S::Resume) => Some(Self::Active),
            _ => None,
        }
    }

    /// Whether focus and blur are delivered in this state.
    pub fn accepts_focus(self) -> bool {
        matches!(self, Self::Active | Self::Hidden)
    }

    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Hidden => write!(f, "HIDDEN"),
            Self::Frozen => write!(f, "FROZEN"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}
