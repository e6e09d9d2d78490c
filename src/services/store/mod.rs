/*
 * Responsibility
 * - key/value store abstraction behind sessions and in-flight login state
 * - MemoryStore for single-process deployments and tests, ValkeyStore for
 *   shared deployments
 */
pub mod memory;
pub mod valkey;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use valkey::ValkeyStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    BackendConnection(String),

    #[error("store command failed: {0}")]
    BackendCommand(String),

    #[error("store returned an unexpected value: {0}")]
    InvalidValue(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically reads and deletes. At most one caller observes a value for
    /// a given key; this is what makes auth codes and state handles
    /// single-use under concurrency.
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;
}
