/*
 * Responsibility
 * - user directory endpoints: /me for any session, the rest admin-only
 *   (enforced by the router's role layer, not here)
 */
use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::users::{ApprovalRequest, RoleChangeRequest, UserDto, UserUpdateResponse};
use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

pub async fn me(ctx: AuthCtx) -> Json<UserDto> {
    Json(ctx.user.into())
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserDto>>, AppError> {
    let users = state.directory.list().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(body): Json<RoleChangeRequest>,
) -> Result<Json<UserUpdateResponse>, AppError> {
    // Roles are never created here; an unknown name is a client error.
    let role = state
        .directory
        .find_role(&body.role_name)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid role name"))?;

    let user = state
        .directory
        .update_role(user_id, role.id)
        .await?
        .ok_or(AppError::not_found("User"))?;

    Ok(Json(UserUpdateResponse {
        message: "User role updated successfully",
        user: user.into(),
    }))
}

pub async fn set_approval(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(body): Json<ApprovalRequest>,
) -> Result<Json<UserUpdateResponse>, AppError> {
    let user = state
        .directory
        .set_approved(user_id, body.approved)
        .await?
        .ok_or(AppError::not_found("User"))?;

    Ok(Json(UserUpdateResponse {
        message: "User approval updated successfully",
        user: user.into(),
    }))
}
