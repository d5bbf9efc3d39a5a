// ABOUTME: The durable key-value store contract the queue persists through.
// ABOUTME: Each get/set/remove is independently durable once it returns Ok.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in a durable store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// String key-value persistence that survives process restarts.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a key. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
