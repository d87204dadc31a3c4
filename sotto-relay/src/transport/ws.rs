//! WebSocket transport backed by an accepted axum socket.

use super::{Transport, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Transport over an accepted WebSocket connection.
///
/// Protocol messages travel as binary frames. Ping/pong frames are
/// handled below this layer (axum replies to pings automatically) and
/// skipped here.
pub struct WsTransport {
    writer: Mutex<SplitSink<WebSocket, WsMessage>>,
    reader: Mutex<SplitStream<WebSocket>>,
    open: AtomicBool,
}

impl WsTransport {
    /// Wrap an accepted WebSocket.
    pub fn new(socket: WebSocket) -> Self {
        let (writer, reader) = socket.split();
        Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            open: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }

        let mut writer = self.writer.lock().await;
        writer
            .send(WsMessage::Binary(data.to_vec()))
            .await
            .map_err(|e| {
                self.open.store(false, Ordering::Release);
                TransportError::SendFailed(e.to_string())
            })
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut reader = self.reader.lock().await;

        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Binary(bytes))) => return Ok(bytes),
                // Control frames carry no protocol data
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Text(_))) => {
                    return Err(TransportError::ReceiveFailed(
                        "unexpected text frame".to_string(),
                    ));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Err(e)) => {
                    self.open.store(false, Ordering::Release);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::Release);

        // Best effort: the peer may already be gone
        let mut writer = self.writer.lock().await;
        let _ = writer.send(WsMessage::Close(None)).await;
        Ok(())
    }
}
