/*
 * Responsibility
 * - process bootstrap: tracing, panic hook, config, database, migrations,
 *   state wiring, serve loop
 * - build_router is public so tests can drive the app without a socket
 */
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppEnv, Config, SessionStoreKind};
use crate::repos::pg::PgDirectory;
use crate::services::oidc::OidcClient;
use crate::services::session::SessionManager;
use crate::services::store::{KeyValueStore, MemoryStore, ValkeyStore};
use crate::state::AppState;

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn init_panic_hook(env: AppEnv) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "panic");
        default_hook(info);
        if env == AppEnv::Development {
            // Fail loudly during development instead of limping on.
            std::process::abort();
        }
    }));
}

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("configuration error")?;
    init_panic_hook(config.env);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("migrations failed")?;

    let store: Arc<dyn KeyValueStore> = match &config.session_store {
        SessionStoreKind::Memory => Arc::new(MemoryStore::new()),
        SessionStoreKind::Valkey { url } => Arc::new(
            ValkeyStore::connect(url)
                .await
                .context("failed to connect to Valkey")?,
        ),
    };
    tracing::info!(backend = store.backend_name(), "session store ready");

    let directory = Arc::new(PgDirectory::new(pool));
    let sessions = Arc::new(SessionManager::new(
        store.clone(),
        directory.clone(),
        config.session_ttl,
        config.secure_cookies(),
    ));
    let flow = Arc::new(OidcClient::new(
        config.oidc.clone(),
        store,
        directory.clone(),
        config.default_role.clone(),
        !config.require_approval,
    ));

    let state = AppState::new(directory, sessions, flow, config.redirects.clone());
    let app = build_router(state);

    tracing::info!(addr = %config.addr, env = ?config.env, "server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Cookies cross the frontend/API origin boundary, so CORS must both pin
    // the origin and allow credentials.
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);
    if let Ok(origin) = state.redirects.origin.parse::<HeaderValue>() {
        cors = cors.allow_origin(origin);
    }

    crate::api::routes::router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
