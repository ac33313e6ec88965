//! Aggregated configuration for one tab.

use serde::{Deserialize, Serialize};
use tabsync_lifecycle::LifecycleConfig;
use tabsync_session::CoordinatorConfig;
use tabsync_store::DEFAULT_NAMESPACE;
use tabsync_transport::OriginBus;
use tabsync_watchdog::WatchdogConfig;

use crate::TabsyncError;

/// Everything a [`TabContext`](crate::TabContext) needs to know, in one
/// document. Missing fields take their defaults:
///
/// ```json
/// {
///   "coordinator": { "profile_ttl_ms": 300000, "breaker": { "max_cycles": 4 } },
///   "lifecycle": { "debounce_delay_ms": 300 },
///   "watchdog": { "interval_ms": 60000, "enabled": true },
///   "store_namespace": "tabsync:session:",
///   "bus_capacity": 64
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabsyncConfig {
    pub coordinator: CoordinatorConfig,
    pub lifecycle: LifecycleConfig,
    pub watchdog: WatchdogConfig,
    /// Prefix for every key this tab writes to the store.
    pub store_namespace: String,
    /// Frames an [`OriginBus`] buffers per listener before the slowest
    /// listener starts losing the oldest ones.
    pub bus_capacity: usize,
}

impl Default for TabsyncConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            lifecycle: LifecycleConfig::default(),
            watchdog: WatchdogConfig::default(),
            store_namespace: DEFAULT_NAMESPACE.to_owned(),
            bus_capacity: OriginBus::DEFAULT_CAPACITY,
        }
    }
}

impl TabsyncConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    /// Returns [`TabsyncError::Config`] if the document is not valid JSON
    /// or a field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self, TabsyncError> {
        serde_json::from_str(json).map_err(TabsyncError::Config)
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Each component config is clamped by its own `validated()`; this
    /// covers the fields owned here.
    /// - `store_namespace` falls back to the default when empty.
    /// - `bus_capacity` at least 1.
    pub fn validated(mut self) -> Self {
        self.coordinator = self.coordinator.validated();
        self.watchdog = self.watchdog.validated();
        if self.store_namespace.is_empty() {
            tracing::warn!("empty store namespace, using default");
            self.store_namespace = DEFAULT_NAMESPACE.to_owned();
        }
        if self.bus_capacity == 0 {
            self.bus_capacity = 1;
        }
        self
    }

    /// Opens the bus every tab of `origin` should share, sized by
    /// `bus_capacity`.
    pub fn origin_bus(&self, origin: impl Into<String>) -> OriginBus {
        OriginBus::with_capacity(origin, self.bus_capacity.max(1))
    }
}
