//! Recording Server
//!
//! Accepts uploaded recordings and serves them back with byte-range support.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screen_recorder::{config::AppConfig, server::WebServer, store::RecordingStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting recording server");

    // Explicit config path as the only argument, otherwise the user config dir
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let mut config = AppConfig::load(std::path::Path::new(&path))
                .with_context(|| format!("Failed to load config from {}", path))?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => AppConfig::load_or_default()?,
    };

    let store = RecordingStore::open(&config.storage)
        .await
        .context("Failed to open recording store")?;

    let server = WebServer::new(config.server.clone(), store);
    tracing::info!("API available at http://{}:{}", config.server.bind_address, config.server.port);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
