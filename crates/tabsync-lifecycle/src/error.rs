//! Error types for the lifecycle layer.

/// Errors returned by [`LifecycleManager`](crate::LifecycleManager).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Another live registration already uses this consumer id.
    #[error("lifecycle consumer {0:?} is already registered")]
    DuplicateConsumer(String),

    /// The page has been torn down; nothing will ever be dispatched again.
    #[error("lifecycle is terminated")]
    Terminated,
}
