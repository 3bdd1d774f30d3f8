use anyhow::{Context, Result};
use axum::{Router, extract::DefaultBodyLimit};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::common::{app_state::AppState, config::AppConfig, db};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn init_env() {
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", err);
    }
}

/// Attach shared state and cross-cutting layers to the application router.
pub fn build_app(app: Router<AppState>, state: AppState) -> Router {
    let body_limit = state.config.server.body_limit;
    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Connect to the database and serve `app` until Ctrl+C is received.
pub async fn bootstrap(service_name: &str, app: Router<AppState>, config: AppConfig) -> Result<()> {
    let db_pool = db::connect(&config.database).await?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(db_pool, config);
    let app = build_app(app, state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("{} listening on {}", service_name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("{} stopped", service_name);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}
