/*
 * Responsibility
 * - opaque session ids: minting on login, resolution on every request,
 *   destruction on logout
 * - cookie construction (HttpOnly, SameSite=Lax, Secure in production)
 */
use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};
use thiserror::Error;
use uuid::Uuid;

use crate::repos::error::RepoError;
use crate::repos::{UserDirectory, UserRecord};
use crate::services::store::{KeyValueStore, StoreError};

pub const SESSION_COOKIE: &str = "session";

const KEY_PREFIX: &str = "session:";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no valid session")]
    NoSession,

    /// The session pointed at a user that no longer exists. Treated as
    /// unauthenticated, never as a server error.
    #[error("session user not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Directory(#[from] RepoError),
}

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    directory: Arc<dyn UserDirectory>,
    ttl: Duration,
    secure_cookies: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        directory: Arc<dyn UserDirectory>,
        ttl: Duration,
        secure_cookies: bool,
    ) -> Self {
        Self {
            store,
            directory,
            ttl,
            secure_cookies,
        }
    }

    /// Mints a fresh session id for `user_id`. Only the id is stored
    /// server-side; the record is re-read from the directory on every
    /// request so role and approval changes apply immediately.
    pub async fn login(&self, user_id: i32) -> Result<String, SessionError> {
        let sid = Uuid::new_v4().to_string();
        self.store
            .put(&format!("{KEY_PREFIX}{sid}"), &user_id.to_string(), self.ttl)
            .await?;
        Ok(sid)
    }

    pub async fn resolve(&self, sid: &str) -> Result<UserRecord, SessionError> {
        let value = self
            .store
            .get(&format!("{KEY_PREFIX}{sid}"))
            .await?
            .ok_or(SessionError::NoSession)?;
        // A corrupted payload is treated as no session, not a server error.
        let user_id: i32 = value.parse().map_err(|_| {
            tracing::warn!("discarding session with non-numeric payload");
            SessionError::NoSession
        })?;
        self.directory
            .find_by_id(user_id)
            .await?
            .ok_or(SessionError::UserNotFound)
    }

    /// Destroys the session server-side. Errors propagate so callers can
    /// refuse to clear the cookie when the stored session may still exist.
    pub async fn logout(&self, sid: &str) -> Result<(), SessionError> {
        self.store.del(&format!("{KEY_PREFIX}{sid}")).await?;
        Ok(())
    }

    pub fn session_cookie(&self, sid: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, sid);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure_cookies);
        cookie.set_max_age(time::Duration::seconds(self.ttl.as_secs() as i64));
        cookie
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure_cookies);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}
