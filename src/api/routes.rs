/*
 * Responsibility
 * - route table and layering order
 * - session_auth wraps everything under /api; the admin subset additionally
 *   carries the Administrator role gate
 */
use axum::{
    Router,
    routing::{get, post, put},
};

use crate::api::handlers::{auth, health, users};
use crate::middleware::{require_role, session_auth};
use crate::state::AppState;

pub const ADMIN_ROLE: &str = "Administrator";

pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{id}/role", put(users::update_role))
        .route("/users/{id}/approval", put(users::set_approval));
    let admin = require_role::apply(admin, ADMIN_ROLE);

    let protected = Router::new()
        .route("/users/me", get(users::me))
        .merge(admin);
    let protected = session_auth::apply(protected, state);

    Router::new()
        .route("/auth/login", get(auth::login_initiate))
        .route("/auth/openid/callback", get(auth::callback))
        .route("/auth/local", post(auth::local_login))
        .route("/auth/local/change-password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        .route("/health", get(health::health))
        .nest("/api", protected)
}
