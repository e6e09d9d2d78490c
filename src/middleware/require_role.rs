/*
 * Responsibility
 * - role gate for admin routes; runs after session_auth
 * - missing AuthCtx → 401, wrong role → 403 (the distinction matters to the
 *   frontend: 401 redirects to login, 403 shows an error)
 */
use axum::{
    Router,
    extract::Request,
    middleware::{Next, from_fn},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, role: &'static str) -> Router<AppState> {
    router.layer(from_fn(move |request: Request, next: Next| {
        authorize(role, request, next)
    }))
}

async fn authorize(
    role: &'static str,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = request
        .extensions()
        .get::<AuthCtx>()
        .ok_or(AppError::Unauthorized)?;

    if !ctx.has_role(role) {
        return Err(AppError::forbidden(format!(
            "Forbidden: requires {role} role"
        )));
    }
    Ok(next.run(request).await)
}
