// Map My World - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use map_my_world::api::{router, AppState};
use map_my_world::config::{init_tracing, Config};
use map_my_world::Store;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_filter);

    let store = Store::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    info!(path = %config.database_path.display(), "database opened");

    let app = router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutting down");
}
