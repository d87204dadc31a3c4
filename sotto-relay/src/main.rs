//! sotto-relay binary entry point.
//!
//! Usage:
//! ```bash
//! sotto-relay --config relay.toml
//! ```

use anyhow::Context;
use sotto_relay::config::Config;
use sotto_relay::http;
use sotto_relay::limits::spawn_shrink_task;
use sotto_relay::server::Relay;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = get_config_path();
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        info!("No configuration file at {:?}, using defaults", config_path);
        Config::default()
    };

    let bind_address = config.server.bind_address.clone();

    http::health::init_start_time();
    let relay = Arc::new(Relay::new(config));
    spawn_shrink_task(relay.rate_limits().clone());

    let app = http::build_router(relay);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!("sotto-relay v{} listening on {}", env!("CARGO_PKG_VERSION"), bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "sotto_relay=info,info".into()))
        .with_target(false)
        .init();
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutdown signal received, draining sessions");
}
