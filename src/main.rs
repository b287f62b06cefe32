//! hushd - HTTP Server Entry Point
//!
//! Serves the ciphertext-only secret store.

use hush::{api, config::ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    info!(
        "Loaded configuration: db={}, addr={}",
        config.db_path.display(),
        config.bind_addr()
    );

    api::serve(config).await?;

    Ok(())
}
