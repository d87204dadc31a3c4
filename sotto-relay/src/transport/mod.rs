//! Transport abstraction for relay sessions.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and wraps an already-accepted connection:
//! - `send()` transmits encoded message bytes
//! - `recv()` receives message bytes
//! - `close()` gracefully terminates
//!
//! Payload bytes pass through unchanged in both directions.

mod mock;
pub mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for sending and receiving relay protocol messages.
///
/// Implementations wrap an accepted connection (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the connection.
    ///
    /// The bytes are an encoded protocol message.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive bytes from the connection.
    ///
    /// Blocks until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if the connection is still open.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
