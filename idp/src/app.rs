/*
 * Responsibility
 * - config loading → key generation → router assembly → axum::serve()
 * - keys must exist before the router is built: no /token or /jwks.json
 *   without signing material
 */
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::codes::MemoryCodeStore;
use crate::config::Config;
use crate::handlers;
use crate::keys::SigningKeys;
use crate::state::AppState;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let state = build_state(&config).await?;
    let app = build_router(state);

    tracing::info!(addr = %config.addr, issuer = %config.issuer, "dummy OIDC provider listening");

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn build_state(config: &Config) -> Result<AppState> {
    let code_ttl = Duration::from_secs(config.code_expiry_seconds);

    // RSA generation is CPU-bound; keep it off the async threads. A failure
    // here is fatal: serving without keys would break every token exchange.
    let keys = tokio::task::spawn_blocking(SigningKeys::generate)
        .await
        .context("key generation task panicked")?
        .context("RSA key generation failed")?;
    tracing::info!("RSA keypair generated, JWKS ready");

    Ok(AppState::new(
        config.issuer.clone(),
        Arc::new(keys),
        Arc::new(MemoryCodeStore::new(code_ttl)),
        code_ttl,
    ))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", get(handlers::authorize))
        .route("/login", get(handlers::login_view))
        .route("/authorize-login", post(handlers::authorize_login))
        .route("/simulate-auth-failure", post(handlers::simulate_auth_failure))
        .route("/token", post(handlers::token))
        .route("/jwks.json", get(handlers::jwks))
        .route("/health", get(handlers::health))
        .with_state(state)
}
