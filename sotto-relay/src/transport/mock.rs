//! Mock transport for testing.
//!
//! Allows pushing inbound frames and capturing sent frames for verification.
//! `recv()` blocks like a real socket, so session loops can run against it.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while a session
/// loop owns the other.
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

struct MockTransportInner {
    connected: AtomicBool,
    // Taking the sender closes the inbound stream
    frame_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    frame_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    sent_frames: Mutex<Vec<Vec<u8>>>,
    fail_next_send: Mutex<Option<String>>,
    fail_next_recv: Mutex<Option<String>>,
}

impl MockTransport {
    /// Create a new mock transport, already "accepted" and open.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockTransportInner {
                connected: AtomicBool::new(true),
                frame_tx: Mutex::new(Some(tx)),
                frame_rx: tokio::sync::Mutex::new(rx),
                sent_frames: Mutex::new(Vec::new()),
                fail_next_send: Mutex::new(None),
                fail_next_recv: Mutex::new(None),
            }),
        }
    }

    /// Push a frame to be returned by a later `recv()` call.
    pub fn push_frame(&self, data: Vec<u8>) {
        let tx = self.inner.frame_tx.lock().unwrap();
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send(data);
        }
    }

    /// Simulate the remote side hanging up.
    ///
    /// Frames already pushed are still delivered before `recv()` reports
    /// the close, matching bytes in flight on a real socket.
    pub fn disconnect(&self) {
        self.inner.frame_tx.lock().unwrap().take();
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.inner.sent_frames.lock().unwrap().clone()
    }

    /// Get the last frame that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.inner.sent_frames.lock().unwrap().last().cloned()
    }

    /// Cause the next `send()` to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        *self.inner.fail_next_send.lock().unwrap() = Some(error.to_string());
    }

    /// Cause the next `recv()` to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        *self.inner.fail_next_recv.lock().unwrap() = Some(error.to_string());
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.inner.connected.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }

        if let Some(error) = self.inner.fail_next_send.lock().unwrap().take() {
            return Err(TransportError::SendFailed(error));
        }

        self.inner.sent_frames.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        if let Some(error) = self.inner.fail_next_recv.lock().unwrap().take() {
            return Err(TransportError::ReceiveFailed(error));
        }

        let mut rx = self.inner.frame_rx.lock().await;
        match rx.recv().await {
            Some(data) => Ok(data),
            None => {
                self.inner.connected.store(false, Ordering::Release);
                Err(TransportError::ConnectionClosed)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.connected.store(false, Ordering::Release);
        self.inner.frame_tx.lock().unwrap().take();
        Ok(())
    }
}
