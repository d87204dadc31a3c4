//! HTTP endpoints for sotto-relay.
//!
//! Provides the WebSocket entry point plus health, metrics, and
//! identifier availability endpoints, all on one listener.

pub mod availability;
pub mod health;
mod metrics;

use crate::gateway;
use crate::server::Relay;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use availability::AvailabilityStatus;
pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/ws", get(gateway::ws_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route(
            "/availability/:identifier",
            get(availability::availability_handler),
        )
        .layer(Extension(relay))
}
