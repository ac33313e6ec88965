//! Durable session storage for tabsync.
//!
//! The store is the only component that touches durable storage and the
//! only resource shared by every tab of an origin. It holds a mirror of
//! the credential, its claims, and the session generation; never the
//! fetched profile, which is a cache.
//!
//! # Failure policy
//!
//! Every operation is async and individually fallible (quota exceeded,
//! storage disabled in private browsing, disk errors). Callers treat a
//! failed write as non-fatal: the in-memory session stays authoritative for
//! the current tab and only cross-reload durability is lost. A failed read
//! at startup means "no session".
//!
//! # Implementations
//!
//! - [`MemoryStore`]: origin storage shared by clones of the handle.
//! - [`FileStore`]: one JSON object on disk, survives restarts.
//! - [`Namespaced`]: prefixes every key so independent features can
//!   share one store.

#![allow(async_fn_in_trait)]

mod error;
mod file;
mod memory;
mod namespaced;

use std::future::Future;
use std::sync::Arc;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use namespaced::{DEFAULT_NAMESPACE, Namespaced};

/// Asynchronous string key-value storage.
///
/// # Example
///
/// ```rust
/// use tabsync_store::{MemoryStore, SessionStore};
///
/// # tokio_test_block_on(async {
/// let store = MemoryStore::new();
/// store.set("credential", "a.b.c").await.unwrap();
/// assert_eq!(store.get("credential").await.unwrap().as_deref(), Some("a.b.c"));
/// store.remove("credential").await.unwrap();
/// assert!(store.get("credential").await.unwrap().is_none());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Reads a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a value. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: SessionStore> SessionStore for Arc<S> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send {
        S::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        S::set(self, key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        S::remove(self, key)
    }
}
