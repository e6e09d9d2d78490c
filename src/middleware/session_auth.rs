/*
 * Responsibility
 * - resolves the session cookie to a user and inserts AuthCtx into request
 *   extensions
 * - no cookie / unknown session / deleted user → 401; store or directory
 *   failures → 500 (never silently unauthenticated)
 */
use axum::{
    Router,
    extract::{Request, State},
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::session::{SESSION_COOKIE, SessionError};
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(from_fn_with_state(state, authenticate))
}

async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let sid = jar.get(SESSION_COOKIE).ok_or(AppError::Unauthorized)?.value();

    let user = state.sessions.resolve(sid).await.map_err(|e| match e {
        SessionError::Store(_) | SessionError::Directory(_) => {
            tracing::error!(error = %e, "session resolution failed");
            AppError::Internal
        }
        SessionError::NoSession | SessionError::UserNotFound => AppError::Unauthorized,
    })?;

    request.extensions_mut().insert(AuthCtx { user });
    Ok(next.run(request).await)
}
