//! Unified Home Control server binary

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unified_home_control::{api, config};

/// Per-request timeout for HTTP vendors (Hue, Nanoleaf)
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "unified_home_control=debug,tower_http=debug,axum::rejection=trace".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Unified Home Control v{}", env!("CARGO_PKG_VERSION"));

    let settings = config::load_settings()?;
    tracing::info!(?settings, "Configuration loaded");

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let legacy_ip = std::env::var(config::LEGACY_DEVICE_ENV).ok();
    let registry = config::load_registry(&settings.devices_file, legacy_ip.as_deref(), &http)
        .context("Failed to load devices")?;
    tracing::info!(devices = ?registry.names(), "Device registry ready");

    let app = api::router(api::AppState::new(registry));

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", settings.host, settings.port))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
