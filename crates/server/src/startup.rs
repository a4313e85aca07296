use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use configs::AppConfig;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, auth::ServerState};
use service::{runtime, store};

/// Upper bound on the interval between expired-session sweeps.
const SESSION_PURGE_MAX_SECS: u64 = 300;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load and validate configuration; a missing file falls back to env vars.
pub fn load_config() -> Result<AppConfig, StartupError> {
    AppConfig::load_or_env().map_err(|e| StartupError::InvalidConfig(e.to_string()))
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

/// Connect the store, prepare storage directories and wire the router.
pub async fn build_app(cfg: AppConfig) -> anyhow::Result<Router> {
    runtime::ensure_env(&cfg.storage)
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;
    let store = store::connect(&cfg.database).await?;
    let purge_every = Duration::from_secs(cfg.session.ttl_secs.clamp(1, SESSION_PURGE_MAX_SECS));
    let state = ServerState::new(store, cfg);
    state.sessions.spawn_purge(purge_every);
    Ok(routes::build_router(state, build_cors()))
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let cfg = load_config()?;
    let addr = bind_addr(&cfg)?;
    let app = build_app(cfg).await?;

    info!(%addr, "starting rating server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
