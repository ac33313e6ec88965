//! Page lifecycle tracking for tabsync.
//!
//! The host environment reports raw signals (visibility, freeze/resume,
//! focus, teardown). [`LifecycleManager`] folds them into a small state
//! machine and dispatches debounced callbacks to registered consumers.
//!
//! # Key types
//!
//! - [`LifecycleManager`]: state machine plus consumer registry
//! - [`LifecycleCallbacks`]: optional hooks a consumer registers
//! - [`Registration`]: disposer guard, unregisters on drop
//! - [`LifecycleState`] / [`LifecycleSignal`]: the state machine
//! - [`LifecycleConfig`]: default debounce delay

mod callbacks;
mod config;
mod error;
mod manager;

pub use callbacks::LifecycleCallbacks;
pub use config::{LifecycleConfig, LifecycleSignal, LifecycleState};
pub use error::LifecycleError;
pub use manager::{LifecycleManager, Registration};
