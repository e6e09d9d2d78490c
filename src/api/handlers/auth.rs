/*
 * Responsibility
 * - login/logout endpoints: OIDC initiation + callback, local password
 *   login, password change, logout
 * - ordering rules live here: credentials are verified before approval is
 *   checked, and logout only clears the cookie once the stored session is
 *   actually gone
 */
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::api::dto::MessageResponse;
use crate::api::dto::auth::{ChangePasswordRequest, LocalLoginRequest, LocalLoginResponse};
use crate::error::{AppError, ErrorBody};
use crate::services::oidc::{AuthFlowError, CallbackParams};
use crate::services::password;
use crate::services::session::SESSION_COOKIE;
use crate::state::AppState;

pub async fn login_initiate(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let redirect = state.flow.begin().await.map_err(|e| {
        tracing::error!(error = %e, "failed to start login flow");
        AppError::Internal
    })?;
    Ok(Redirect::to(&redirect.authorize_url))
}

pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let user = match state.flow.complete(params).await {
        Ok(user) => user,
        Err(e @ (AuthFlowError::Store(_) | AuthFlowError::Directory(_))) => {
            tracing::error!(error = %e, "callback failed on backend infrastructure");
            return Err(AppError::Internal);
        }
        Err(e) => {
            // Bad state, replayed code, failed verification: send the
            // browser back to the login page rather than surfacing a 4xx.
            tracing::warn!(error = %e, "login callback rejected");
            return Ok(Redirect::to(&state.redirects.login).into_response());
        }
    };

    let sid = state.sessions.login(user.id).await.map_err(|e| {
        tracing::error!(error = %e, "failed to create session");
        AppError::Internal
    })?;
    let cookie = state.sessions.session_cookie(sid);

    let target = if user.approved {
        &state.redirects.dashboard
    } else {
        &state.redirects.pending_approval
    };
    Ok((jar.add(cookie), Redirect::to(target)).into_response())
}

pub async fn local_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LocalLoginRequest>,
) -> Result<Response, AppError> {
    let (Some(email), Some(pw)) = (
        body.email.filter(|v| !v.is_empty()),
        body.password.filter(|v| !v.is_empty()),
    ) else {
        return Err(AppError::bad_request("Email and password are required"));
    };

    let user = state
        .directory
        .find_by_email(&email)
        .await?
        .filter(|u| u.local)
        .ok_or(AppError::Unauthorized)?;

    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || {
        password::verify_password(hash.as_deref(), &pw)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "password verification task panicked");
        AppError::Internal
    })?;

    if !verified {
        return Err(AppError::Unauthorized);
    }
    // Approval is checked only after the credentials pass, so this response
    // never leaks whether an unapproved account's password was right.
    if !user.approved {
        return Err(AppError::forbidden("Account is pending approval"));
    }

    let sid = state.sessions.login(user.id).await.map_err(|e| {
        tracing::error!(error = %e, "failed to create session");
        AppError::Internal
    })?;
    let cookie = state.sessions.session_cookie(sid);

    let body = LocalLoginResponse {
        message: "ok",
        force_password_change: user.force_password_change,
    };
    Ok((jar.add(cookie), Json(body)).into_response())
}

pub async fn change_password(
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    let (Some(email), Some(old_pw), Some(new_pw)) = (
        body.email.filter(|v| !v.is_empty()),
        body.old_password.filter(|v| !v.is_empty()),
        body.new_password.filter(|v| !v.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "email, oldPassword and newPassword are required",
        ));
    };

    let user = state
        .directory
        .find_by_email(&email)
        .await?
        .ok_or(AppError::not_found("User"))?;
    if user.password_hash.is_none() {
        return Err(AppError::bad_request("User has no local password"));
    }

    let hash = user.password_hash.clone();
    let new_hash = tokio::task::spawn_blocking(move || {
        if !password::verify_password(hash.as_deref(), &old_pw) {
            return Ok(None);
        }
        password::hash_password(&new_pw).map(Some)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "password change task panicked");
        AppError::Internal
    })?
    .map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        AppError::Internal
    })?
    .ok_or(AppError::Unauthorized)?;

    state.directory.update_password(user.id, &new_hash).await?;
    Ok(Json(MessageResponse {
        message: "Password changed",
    })
    .into_response())
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        // If the store refuses the delete, the session may still be live;
        // keep the cookie so the client does not think it is logged out.
        if let Err(e) = state.sessions.logout(cookie.value()).await {
            tracing::error!(error = %e, "failed to destroy session");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    message: "Error destroying session".into(),
                }),
            )
                .into_response();
        }
    }
    (
        jar.add(state.sessions.removal_cookie()),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
        .into_response()
}
