//! Key namespacing.

use crate::{SessionStore, StoreError};

/// Namespace used for session keys unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "tabsync:session:";

/// Wraps a store and prefixes every key with a fixed namespace.
///
/// `Namespaced::new(store, "tabsync:session:")` turns `get("credential")`
/// into `get("tabsync:session:credential")` on the inner store.
#[derive(Debug, Clone)]
pub struct Namespaced<S> {
    inner: S,
    prefix: String,
}

impl<S: SessionStore> Namespaced<S> {
    pub fn new(inner: S, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl<S: SessionStore> SessionStore for Namespaced<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(&self.key(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(&self.key(key), value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(&self.key(key)).await
    }
}
