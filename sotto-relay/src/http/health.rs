//! Health check endpoint.

use crate::server::Relay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record the server start time. Call once at startup.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always "ok" when the server is responding.
    pub status: &'static str,
    /// Server version from Cargo.toml.
    pub version: &'static str,
    /// Number of active sessions.
    pub connections: usize,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<Relay>>) -> Json<HealthStatus> {
    let uptime_seconds = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: relay.registry().len(),
        uptime_seconds,
    })
}
