//! Session watchdog for tabsync.
//!
//! Audits the session on a fixed interval so a tab that sits idle still
//! notices an expired or revoked credential:
//!
//! - [`AuditScheduler`]: fixed-interval timer with initial jitter,
//!   skip-on-overrun, and pause/resume
//! - [`Watchdog`]: the actor that runs [`audit`] on each tick and on demand
//! - [`WatchdogHandle`]: pause/resume, `audit_now`, counters, redirect
//!   events; stops the actor on drop
//!
//! The watchdog never talks to the network itself. It reads the profile
//! through the coordinator, which fetches only when its cache is stale.

mod config;
mod scheduler;
mod watchdog;

pub use config::WatchdogConfig;
pub use scheduler::{AuditScheduler, TickInfo};
pub use watchdog::{AuditOutcome, Watchdog, WatchdogEvent, WatchdogHandle, WatchdogStats, audit};
