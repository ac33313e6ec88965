//! Error types for the storage layer.

/// Errors a [`SessionStore`](crate::SessionStore) operation can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Storage is switched off (private browsing, denied permission).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The write would exceed the storage quota.
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing data exists but cannot be parsed.
    #[error("stored data is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}
