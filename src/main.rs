use anyhow::Context;
use campus_api::{app, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SUPABASE_*, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();
    logging::init_subscriber(&config.logging);
    tracing::info!("Starting Campus API in {:?} mode", config.environment);

    let state = app::AppState::from_config(config)?;
    let store = state.store.clone();
    let app = app::router(state, &config.security);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Campus API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
