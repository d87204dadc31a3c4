//! WebSocket accept path.
//!
//! Admission checks run before the upgrade, while the client is still an
//! HTTP request that can be refused with a status code. Once upgraded,
//! the socket is wrapped in a transport and handed to a session.

use crate::server::Relay;
use crate::session::Session;
use crate::transport::WsTransport;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Headroom on top of `max_frame_size` for the message envelope
/// (type tag, sender and recipient identifiers).
const ENVELOPE_OVERHEAD: usize = 1024;

/// Handle `GET /ws`: admission checks, then upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(relay): Extension<Arc<Relay>>,
) -> Response {
    if let Err(e) = relay.rate_limits().check_connection(addr.ip()) {
        tracing::warn!("Connection from {} refused: {}", addr, e);
        relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }

    let max_sessions = relay.config().limits.max_concurrent_sessions;
    if relay.registry().len() >= max_sessions {
        tracing::warn!(
            "Connection from {} refused: at capacity ({} sessions)",
            addr,
            max_sessions
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let max_frame = relay.config().limits.max_frame_size;
    ws.max_message_size(max_frame + ENVELOPE_OVERHEAD)
        .on_upgrade(move |socket| accept_connection(socket, addr, relay))
}

/// Run a session over an upgraded socket until it completes.
async fn accept_connection(socket: WebSocket, addr: SocketAddr, relay: Arc<Relay>) {
    relay.metrics().connections_total.fetch_add(1, Ordering::Relaxed);

    let transport = Arc::new(WsTransport::new(socket));
    let session = Session::new(relay, transport, addr);

    if let Err(e) = session.run().await {
        tracing::warn!("Session from {} ended with error: {}", addr, e);
    }
}
