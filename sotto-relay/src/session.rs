//! Per-connection session management.
//!
//! Each connection gets a Session that walks the join handshake, then
//! pumps frames both ways until the connection closes or is evicted.
//! All waits are bounded: a session can stall on a timeout, never forever.

use crate::config::LimitsConfig;
use crate::error::{ProtocolError, ProtocolResult, RelayError};
use crate::registry::PeerHandle;
use crate::router::Frame;
use crate::server::Relay;
use crate::transport::{Transport, TransportError};
use sotto_types::{
    ConnectionId, Message, Notice, NoticeEvent, ParticipantId, Welcome, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Session state machine states.
///
/// `Closed` is terminal: a session never re-enters `Active`.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Waiting for JOIN message.
    Joining,
    /// Session is active under a claimed identifier.
    Active {
        /// The identifier this session is reachable under.
        identifier: ParticipantId,
    },
    /// Session has ended.
    Closed,
}

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    /// Remote closed the socket.
    ClientClosed,
    /// Remote sent LEAVE.
    ClientLeft,
    /// No inbound traffic within the idle window.
    IdleTimeout,
    /// An outbound write stalled past the send timeout.
    SendTimeout,
    /// Registry entry removed by another path (slow-consumer eviction).
    Evicted,
    /// Transport failed mid-session.
    TransportFailed,
    /// Protocol violation or rate limit trip.
    ProtocolFault,
}

/// A per-connection session.
pub struct Session {
    relay: Arc<Relay>,
    transport: Arc<dyn Transport>,
    remote: SocketAddr,
    connection_id: ConnectionId,
    state: SessionState,
}

impl Session {
    /// Create a new session for an accepted connection.
    pub fn new(relay: Arc<Relay>, transport: Arc<dyn Transport>, remote: SocketAddr) -> Self {
        Self {
            relay,
            transport,
            remote,
            connection_id: ConnectionId::new(),
            state: SessionState::Joining,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the session until completion.
    ///
    /// Registration, notification, and teardown all happen in here; the
    /// caller only spawns and logs.
    pub async fn run(mut self) -> Result<(), RelayError> {
        tracing::info!("New connection from {}", self.remote);

        let (identifier, mut rx) = match self.join_phase().await? {
            Some(established) => established,
            None => {
                self.state = SessionState::Closed;
                return Ok(());
            }
        };

        self.state = SessionState::Active {
            identifier: identifier.clone(),
        };

        let reason = self.active_loop(&identifier, &mut rx).await;

        self.state = SessionState::Closed;
        self.teardown(&identifier, reason).await;

        Ok(())
    }

    /// Wait for JOIN, claim the identifier, send WELCOME.
    ///
    /// Returns the claimed identifier and the outbound queue receiver, or
    /// `None` if the connection ended without establishing a session
    /// (timeout, early close, duplicate identifier).
    async fn join_phase(
        &self,
    ) -> Result<Option<(ParticipantId, mpsc::Receiver<Arc<Vec<u8>>>)>, RelayError> {
        let limits = self.relay.config().limits.clone();
        let join_timeout = Duration::from_secs(limits.join_timeout_secs);

        let bytes = match timeout(join_timeout, self.transport.recv()).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(TransportError::ConnectionClosed)) => {
                tracing::debug!("Connection from {} closed during JOIN wait", self.remote);
                return Ok(None);
            }
            Ok(Err(e)) => {
                tracing::debug!("Transport error during JOIN wait: {}", e);
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!(
                    "JOIN timeout ({}s) for {}",
                    join_timeout.as_secs(),
                    self.remote
                );
                let _ = self.transport.close().await;
                return Ok(None);
            }
        };

        let join = match self.parse_join(&bytes) {
            Ok(join) => join,
            Err(e) => {
                self.relay.metrics().errors_total.fetch_add(1, Ordering::Relaxed);
                let _ = self.transport.close().await;
                return Err(e.into());
            }
        };

        let identifier = join.identifier;

        // Queue must exist before registration so frames can arrive the
        // instant the identifier becomes visible to other sessions
        let (tx, rx) = mpsc::channel(limits.send_queue_depth);
        let handle = PeerHandle::new(self.connection_id, tx);

        if self.relay.registry().register(identifier.clone(), handle).is_err() {
            tracing::info!(
                "Rejected duplicate identifier from {}: id={}",
                self.remote,
                identifier
            );
            self.send_notice(NoticeEvent::DuplicateIdentifier, &identifier).await;
            let _ = self.transport.close().await;
            return Ok(None);
        }

        let welcome = Message::Welcome(Welcome {
            version: PROTOCOL_VERSION,
        });
        if let Err(e) = self.send_message(&welcome).await {
            self.relay.registry().unregister(&identifier, self.connection_id);
            let _ = self.transport.close().await;
            return Err(e);
        }

        self.relay.metrics().joins_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Session established: id={} from {}", identifier, self.remote);

        // Anyone whose relay missed this identifier hears that it is back
        let waiters = self.relay.presence().on_join(&identifier);
        self.relay.notify(&waiters, NoticeEvent::PeerOnline, &identifier);

        Ok(Some((identifier, rx)))
    }

    /// Decode and validate the JOIN message.
    fn parse_join(&self, bytes: &[u8]) -> ProtocolResult<sotto_types::Join> {
        let message = Message::from_bytes(bytes).map_err(|e| ProtocolError::InvalidMessage {
            reason: e.to_string(),
        })?;

        let join = match message {
            Message::Join(join) => join,
            Message::Relay(_) => return Err(ProtocolError::NotJoined),
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    expected: "join".to_string(),
                    actual: other.kind().to_string(),
                });
            }
        };

        if join.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                client: join.version,
                server: PROTOCOL_VERSION,
            });
        }

        validate_identifier(&join.identifier, self.relay.config().limits.max_identifier_len)?;

        Ok(join)
    }

    /// Pump frames both ways until something ends the session.
    async fn active_loop(
        &self,
        identifier: &ParticipantId,
        rx: &mut mpsc::Receiver<Arc<Vec<u8>>>,
    ) -> CloseReason {
        let limits = self.relay.config().limits.clone();
        let idle_timeout = Duration::from_secs(limits.idle_timeout_secs);
        let send_timeout = Duration::from_secs(limits.send_timeout_secs);

        loop {
            tokio::select! {
                outbound = rx.recv() => {
                    match outbound {
                        Some(frame) => {
                            match timeout(send_timeout, self.transport.send(&frame)).await {
                                Ok(Ok(())) => {}
                                Ok(Err(e)) => {
                                    tracing::debug!(
                                        "Outbound write failed for id={}: {}",
                                        identifier,
                                        e
                                    );
                                    return CloseReason::TransportFailed;
                                }
                                Err(_) => {
                                    tracing::warn!("Outbound write timed out for id={}", identifier);
                                    return CloseReason::SendTimeout;
                                }
                            }
                        }
                        // Registry entry gone: the last queue sender was dropped
                        None => return CloseReason::Evicted,
                    }
                }
                inbound = timeout(idle_timeout, self.transport.recv()) => {
                    match inbound {
                        Ok(Ok(bytes)) => match self.handle_frame(identifier, &bytes, &limits).await {
                            Ok(None) => {}
                            Ok(Some(reason)) => return reason,
                            Err(e) => {
                                tracing::warn!("Protocol error for id={}: {}", identifier, e);
                                self.relay.metrics().errors_total.fetch_add(1, Ordering::Relaxed);
                                return CloseReason::ProtocolFault;
                            }
                        },
                        Ok(Err(TransportError::ConnectionClosed)) => {
                            return CloseReason::ClientClosed;
                        }
                        Ok(Err(e)) => {
                            tracing::debug!("Transport error for id={}: {}", identifier, e);
                            return CloseReason::TransportFailed;
                        }
                        Err(_) => {
                            tracing::info!("Idle timeout for id={}", identifier);
                            return CloseReason::IdleTimeout;
                        }
                    }
                }
            }
        }
    }

    /// Handle one inbound frame while active.
    ///
    /// `Ok(None)` keeps the session running; `Ok(Some(reason))` ends it
    /// cleanly; `Err` ends it as a protocol fault.
    async fn handle_frame(
        &self,
        identifier: &ParticipantId,
        bytes: &[u8],
        limits: &LimitsConfig,
    ) -> ProtocolResult<Option<CloseReason>> {
        if bytes.len() > limits.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: bytes.len(),
                limit: limits.max_frame_size,
            });
        }

        let message = Message::from_bytes(bytes).map_err(|e| ProtocolError::InvalidMessage {
            reason: e.to_string(),
        })?;

        match message {
            Message::Relay(relay_msg) => {
                if let Err(e) = self.relay.rate_limits().check_global() {
                    tracing::warn!("Global rate limit exceeded: {}", e);
                    self.relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                    return Err(ProtocolError::RateLimited {
                        reason: e.to_string(),
                    });
                }
                if let Err(e) = self.relay.rate_limits().check_message(&identifier.digest()) {
                    tracing::warn!("Relay rate limited for id={}: {}", identifier, e);
                    self.relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                    return Err(ProtocolError::RateLimited {
                        reason: e.to_string(),
                    });
                }

                let recipients = relay_msg.to.into_vec();
                if recipients.is_empty() {
                    return Err(ProtocolError::InvalidMessage {
                        reason: "relay names no recipient".to_string(),
                    });
                }
                if recipients.len() > limits.max_recipients {
                    return Err(ProtocolError::TooManyRecipients {
                        count: recipients.len(),
                        limit: limits.max_recipients,
                    });
                }

                let report = self.relay.router().forward(Frame {
                    from: identifier.clone(),
                    to: recipients,
                    payload: relay_msg.payload,
                });

                for missing in &report.unavailable {
                    self.relay.metrics().frames_unavailable.fetch_add(1, Ordering::Relaxed);
                    self.send_notice(NoticeEvent::RecipientUnavailable, missing).await;
                    self.register_waiting_interest(identifier, missing).await;
                }

                Ok(None)
            }
            Message::Leave(leave) => {
                tracing::info!(
                    "Client leaving: id={} ({})",
                    identifier,
                    leave.reason.as_deref().unwrap_or("no reason")
                );
                Ok(Some(CloseReason::ClientLeft))
            }
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "relay or leave".to_string(),
                actual: other.kind().to_string(),
            }),
        }
    }

    /// Remember that this session wants to hear when `awaited` joins.
    async fn register_waiting_interest(&self, identifier: &ParticipantId, awaited: &ParticipantId) {
        self.relay.presence().add_waiter(awaited, identifier);

        // The awaited participant may have joined between the failed
        // lookup and the line above. Whoever removes the interest sends
        // the notice, so it arrives exactly once either way.
        if self.relay.registry().contains(awaited)
            && self.relay.presence().remove_waiter(awaited, identifier)
        {
            self.send_notice(NoticeEvent::PeerOnline, awaited).await;
        }
    }

    /// Release the identifier and tell linked peers.
    async fn teardown(&self, identifier: &ParticipantId, reason: CloseReason) {
        self.relay.registry().unregister(identifier, self.connection_id);

        // Peers that exchanged frames with this session stay connected;
        // they only hear that this one is gone
        let peers = self.relay.presence().on_leave(identifier);
        self.relay.notify(&peers, NoticeEvent::PeerLeft, identifier);

        match reason {
            CloseReason::ClientClosed | CloseReason::ClientLeft => {
                tracing::info!("Session closed: id={} ({:?})", identifier, reason);
            }
            CloseReason::IdleTimeout | CloseReason::SendTimeout | CloseReason::Evicted => {
                tracing::warn!("Session evicted: id={} ({:?})", identifier, reason);
            }
            CloseReason::TransportFailed | CloseReason::ProtocolFault => {
                tracing::warn!("Session failed: id={} ({:?})", identifier, reason);
            }
        }

        let _ = self.transport.close().await;
    }

    /// Encode and send a message, bounded by the send timeout.
    async fn send_message(&self, message: &Message) -> Result<(), RelayError> {
        let bytes = message.to_bytes().map_err(ProtocolError::Wire)?;
        let send_timeout = Duration::from_secs(self.relay.config().limits.send_timeout_secs);

        match timeout(send_timeout, self.transport.send(&bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(TransportError::Timeout.into()),
        }
    }

    /// Send a notice on this session's own connection, best effort.
    async fn send_notice(&self, event: NoticeEvent, detail: &ParticipantId) {
        let notice = Message::Notice(Notice {
            event,
            detail: detail.clone(),
        });
        if let Err(e) = self.send_message(&notice).await {
            tracing::debug!("Failed to send {:?} notice: {}", event, e);
        }
    }
}

/// Validate a joining identifier.
///
/// Identifiers are opaque to the relay, so the only checks are that one
/// is present and that it fits the configured length cap.
fn validate_identifier(id: &ParticipantId, max_len: usize) -> ProtocolResult<()> {
    if id.is_empty() {
        return Err(ProtocolError::InvalidIdentifier {
            reason: "identifier is empty".to_string(),
        });
    }
    if id.len() > max_len {
        return Err(ProtocolError::InvalidIdentifier {
            reason: format!("identifier exceeds {} bytes", max_len),
        });
    }
    Ok(())
}
