/*
 * Responsibility
 * - AuthCtx: the authenticated user attached to a request by session_auth
 * - FromRequestParts lets handlers take it as an argument; absence means the
 *   route was wired outside the session layer, which surfaces as 401
 */
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::repos::UserRecord;

#[derive(Clone)]
pub struct AuthCtx {
    pub user: UserRecord,
}

impl AuthCtx {
    pub fn has_role(&self, role: &str) -> bool {
        self.user.role == role
    }
}

impl<S> FromRequestParts<S> for AuthCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthCtx>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
