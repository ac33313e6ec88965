//! In-memory origin storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{SessionStore, StoreError};

/// Storage shared by every clone of the handle, the way `localStorage` is
/// shared by every tab of an origin.
///
/// It can be switched off with [`set_available`](Self::set_available) to
/// behave like storage in private browsing, and given a byte quota.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, String>,
    available: bool,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                available: true,
                quota_bytes: None,
            })),
        }
    }

    /// A store that refuses writes once keys plus values exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::new();
        store.lock().quota_bytes = Some(bytes);
        store
    }

    /// Turns storage off (`false`) or back on. While off, every operation
    /// fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Copy of every stored entry.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().entries.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_available(inner: &Inner) -> Result<(), StoreError> {
        if inner.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("storage is disabled".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self.lock();
        Self::ensure_available(&inner)?;
        Ok(inner.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;

        if let Some(quota) = inner.quota_bytes {
            let others: usize = inner
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }

        inner.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::ensure_available(&inner)?;
        inner.entries.remove(key);
        Ok(())
    }
}
