/*
 * Responsibility
 * - Valkey-backed KeyValueStore via redis ConnectionManager
 * - TTLs map to SET EX; take() maps to GETDEL so single-use stays atomic
 *   across processes
 */
use std::time::Duration;

use async_trait::async_trait;

use super::{KeyValueStore, StoreError};

#[derive(Clone)]
pub struct ValkeyStore {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyStore {
    // Connects from a URL like `redis://localhost:6379`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl KeyValueStore for ValkeyStore {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();

        let resp: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::BackendCommand(e.to_string()))?;

        Ok(resp)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        // EX expects integer seconds; clamp to at least 1 sec.
        let ttl_seconds: u64 = ttl.as_secs().max(1);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::BackendCommand(e.to_string()))?;

        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();

        // GETDEL returns the old value (or Nil) and removes the key in one
        // round trip; two racing callers can never both see the value.
        let resp: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::BackendCommand(e.to_string()))?;

        Ok(resp)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        let _: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::BackendCommand(e.to_string()))?;

        Ok(())
    }
}
