//! # tabsync
//!
//! Keeps one user's session consistent across every tab of an origin.
//!
//! Each tab is a [`TabContext`]: a session coordinator that deduplicates
//! profile fetches and breaks sign-in/sign-out loops, a listener that
//! applies other tabs' changes by generation, a lifecycle manager that
//! revalidates after the tab was frozen, and a watchdog that audits the
//! session on a timer. Tabs share an [`OriginBus`](tabsync_transport::OriginBus)
//! and a durable [`SessionStore`](tabsync_store::SessionStore).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tabsync::prelude::*;
//!
//! # async fn run<F: ProfileFetcher>(fetcher: F) -> Result<(), TabsyncError> {
//! let config = TabsyncConfig::default();
//! let bus = config.origin_bus("https://shop.example");
//! let tab = TabContextBuilder::new()
//!     .config(config)
//!     .build(MemoryStore::new(), fetcher, bus)
//!     .await?;
//!
//! tab.coordinator().sign_in("header.payload.signature").await?;
//! let _profile = tab.coordinator().get_profile(false).await?;
//!
//! tab.signal(LifecycleSignal::Freeze);
//! tab.signal(LifecycleSignal::Resume); // refetches the profile
//! tab.shutdown().await
//! # }
//! ```

mod config;
mod context;
mod error;

pub use config::TabsyncConfig;
pub use context::{SESSION_CONSUMER, TabCoordinator, TabContext, TabContextBuilder};
pub use error::TabsyncError;

pub use tabsync_lifecycle as lifecycle;
pub use tabsync_protocol as protocol;
pub use tabsync_session as session;
pub use tabsync_store as store;
pub use tabsync_transport as transport;
pub use tabsync_watchdog as watchdog;

/// The types most tabs need, in one import.
pub mod prelude {
    pub use crate::{TabContext, TabContextBuilder, TabsyncConfig, TabsyncError};
    pub use tabsync_lifecycle::{
        LifecycleCallbacks, LifecycleManager, LifecycleSignal, LifecycleState, Registration,
    };
    pub use tabsync_protocol::{Claims, Credential, Generation, Profile, TabId};
    #[cfg(feature = "http")]
    pub use tabsync_session::HttpProfileFetcher;
    pub use tabsync_session::{
        FetchError, ProfileFetcher, SessionCoordinator, SessionError, SessionEvent, SignOutReason,
    };
    pub use tabsync_store::{FileStore, MemoryStore, SessionStore};
    pub use tabsync_transport::OriginBus;
    pub use tabsync_watchdog::{AuditOutcome, WatchdogEvent, WatchdogHandle};
}
