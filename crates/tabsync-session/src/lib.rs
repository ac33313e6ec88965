//! Session coordination for tabsync.
//!
//! This crate owns a tab's view of who is signed in:
//!
//! 1. **Coordinator** ([`SessionCoordinator`]): the single owner of the
//!    session. Sign-in, sign-out, profile reads, remote changes, and the
//!    startup restore all go through it.
//! 2. **Profile fetching** ([`ProfileFetcher`] trait,
//!    [`HttpProfileFetcher`] with feature `http`): single-flight,
//!    TTL-cached, retried with capped backoff.
//! 3. **Refresh-loop breaking**: too many sign-in/sign-out cycles in a
//!    short window suspend automatic refreshes until an explicit sign-in.
//!
//! # How it fits in the stack
//!
//! ```text
//! Tab context (above)  ← wires lifecycle and watchdog to the coordinator
//!     ↕
//! Session Layer (this crate)  ← session state, fetches, generations
//!     ↕
//! Store / Transport (below)  ← durable mirror, cross-tab broadcast
//! ```

#![allow(async_fn_in_trait)]

mod breaker;
mod config;
mod coordinator;
mod error;
mod fetcher;
#[cfg(feature = "http")]
mod http;
mod session;

pub use config::{BreakerConfig, CoordinatorConfig};
pub use coordinator::{CLAIMS_KEY, CREDENTIAL_KEY, GENERATION_KEY, SessionCoordinator};
pub use error::SessionError;
pub use fetcher::{FetchError, ProfileFetcher};
#[cfg(feature = "http")]
pub use http::HttpProfileFetcher;
pub use session::{Session, SessionEvent, SignOutReason};
