mod caption;
mod compose;
mod config;
mod decode;
mod gemini;
mod layout;
mod models;
mod profile;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use crate::compose::Composer;
use crate::config::Settings;
use crate::gemini::GeminiClient;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Settings::from_env();
    match &settings.gemini_api_key {
        Some(key) => tracing::info!("Using API key: {}...", key.chars().take(6).collect::<String>()),
        None => tracing::warn!("GEMINI_API_KEY not set, compositions will use the local fallback"),
    }
    tracing::info!(
        timeout = ?settings.remote_timeout,
        describe_fallback = settings.describe_fallback,
        placeholder = ?settings.placeholder_style,
        "Composition settings"
    );

    let gemini = GeminiClient::new(&settings).context("building Gemini client")?;
    let state = AppState {
        composer: Arc::new(Composer::new(Arc::new(gemini), &settings)),
    };
    let app = routes::router(state, settings.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "🚀 Starting SnapWear compose server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
