//! Prometheus metrics endpoint.

use crate::server::Relay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<Relay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges — current state
    let connections = relay.registry().len();
    let connection_keys = relay.rate_limits().connection_keys_count();
    let message_keys = relay.rate_limits().message_keys_count();

    // Counters — monotonic since startup
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let joins = m.joins_total.load(Ordering::Relaxed);
    let forwarded = m.frames_forwarded.load(Ordering::Relaxed);
    let unavailable = m.frames_unavailable.load(Ordering::Relaxed);
    let dropped = m.frames_dropped.load(Ordering::Relaxed);
    let bytes_relayed = m.bytes_relayed.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP sotto_relay_connections_active Number of active sessions
# TYPE sotto_relay_connections_active gauge
sotto_relay_connections_active {connections}

# HELP sotto_relay_info Server information
# TYPE sotto_relay_info gauge
sotto_relay_info{{version="{version}"}} 1

# HELP sotto_relay_limiter_connection_keys Tracked per-IP limiter keys
# TYPE sotto_relay_limiter_connection_keys gauge
sotto_relay_limiter_connection_keys {connection_keys}

# HELP sotto_relay_limiter_message_keys Tracked per-sender limiter keys
# TYPE sotto_relay_limiter_message_keys gauge
sotto_relay_limiter_message_keys {message_keys}

# HELP sotto_relay_connections_total Total connections accepted
# TYPE sotto_relay_connections_total counter
sotto_relay_connections_total {conns_total}

# HELP sotto_relay_joins_total Total successful joins
# TYPE sotto_relay_joins_total counter
sotto_relay_joins_total {joins}

# HELP sotto_relay_frames_forwarded_total Total frames delivered to recipients
# TYPE sotto_relay_frames_forwarded_total counter
sotto_relay_frames_forwarded_total {forwarded}

# HELP sotto_relay_frames_unavailable_total Total frames addressed to absent recipients
# TYPE sotto_relay_frames_unavailable_total counter
sotto_relay_frames_unavailable_total {unavailable}

# HELP sotto_relay_frames_dropped_total Total frames dropped on full send queues
# TYPE sotto_relay_frames_dropped_total counter
sotto_relay_frames_dropped_total {dropped}

# HELP sotto_relay_bytes_relayed_total Total ciphertext payload bytes forwarded
# TYPE sotto_relay_bytes_relayed_total counter
sotto_relay_bytes_relayed_total {bytes_relayed}

# HELP sotto_relay_rate_limit_hits_total Total rate limit rejections
# TYPE sotto_relay_rate_limit_hits_total counter
sotto_relay_rate_limit_hits_total {rate_limits}

# HELP sotto_relay_errors_total Total protocol errors
# TYPE sotto_relay_errors_total counter
sotto_relay_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    #[test]
    fn prometheus_format_is_valid() {
        // Verify the format strings are valid
        let sample = format!(
            "# TYPE sotto_relay_connections_active gauge\nsotto_relay_connections_active {}",
            42
        );
        assert!(sample.contains("gauge"));
        assert!(sample.contains("42"));
    }
}
