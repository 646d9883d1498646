use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lattice_api::app::{router, AppState};
use lattice_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DB_URL, AUTH_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let port = config.server.port;

    let state = AppState::new(config).context("building application state")?;
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("lattice-api listening on http://{bind_addr}");
    axum::serve(listener, app).await.context("server")?;

    Ok(())
}
