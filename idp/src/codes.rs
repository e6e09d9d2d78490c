/*
 * Responsibility
 * - ephemeral authorization-code cache
 * - redemption is a single atomic get+delete: two concurrent /token calls with
 *   the same code can never both succeed
 * - codes expire after a fixed TTL; expired entries are refused (and dropped)
 *   even if the delayed cleanup has not run yet
 */
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Everything recorded when a code is minted. Redemption re-validates
/// `client_id` and `redirect_uri` against the original authorization request.
#[derive(Clone, Debug)]
pub struct AuthCodeData {
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub nonce: Option<String>,
    pub subject: String,
    pub issued_at: Instant,
}

impl AuthCodeData {
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.issued_at.elapsed() > ttl
    }
}

/// Injected store abstraction so the provider stays testable and the handlers
/// never touch shared state directly.
#[async_trait]
pub trait CodeStore: Send + Sync + 'static {
    async fn insert(&self, code: String, data: AuthCodeData);

    /// Atomically remove and return the entry for `code`.
    ///
    /// Returns `None` for unknown codes and for expired ones; an expired entry
    /// is deleted as a side effect.
    async fn take(&self, code: &str) -> Option<AuthCodeData>;

    /// Drop the entry if it has outlived the TTL (delayed cleanup path).
    async fn remove_if_expired(&self, code: &str);
}

pub struct MemoryCodeStore {
    ttl: Duration,
    codes: Mutex<HashMap<String, AuthCodeData>>,
}

impl MemoryCodeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            codes: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn insert(&self, code: String, data: AuthCodeData) {
        let mut codes = self.codes.lock().expect("code store lock");
        codes.insert(code, data);
    }

    async fn take(&self, code: &str) -> Option<AuthCodeData> {
        let mut codes = self.codes.lock().expect("code store lock");
        let data = codes.remove(code)?;
        if data.is_expired(self.ttl) {
            tracing::info!(code, "authorization code expired at redemption");
            return None;
        }
        Some(data)
    }

    async fn remove_if_expired(&self, code: &str) {
        let mut codes = self.codes.lock().expect("code store lock");
        if let Some(data) = codes.get(code)
            && data.is_expired(self.ttl)
        {
            codes.remove(code);
            tracing::info!(code, "expired authorization code removed");
        }
    }
}
