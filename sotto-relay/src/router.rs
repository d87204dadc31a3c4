//! Frame routing between live sessions.
//!
//! The router resolves recipients against the registry and enqueues the
//! encoded frame onto each recipient's outbound queue. Delivery is
//! fire-and-forget: nothing is stored, nothing is retried. Payload bytes
//! are never inspected, only wrapped.

use crate::presence::PresenceTracker;
use crate::registry::{SendOutcome, SessionRegistry};
use crate::server::RelayMetrics;
use sotto_types::{Deliver, Message, ParticipantId, Payload};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A relay request resolved from an inbound frame.
#[derive(Debug)]
pub struct Frame {
    /// Sender's identifier.
    pub from: ParticipantId,
    /// Recipient identifiers, duplicates allowed.
    pub to: Vec<ParticipantId>,
    /// Opaque payload to forward byte-for-byte.
    pub payload: Payload,
}

/// What happened to each recipient of a forwarded frame.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Recipients whose queue accepted the frame.
    pub delivered: Vec<ParticipantId>,
    /// Recipients with no live session. The sender is told about each.
    pub unavailable: Vec<ParticipantId>,
}

/// Routes frames from senders to recipient queues.
pub struct Router {
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceTracker>,
    metrics: Arc<RelayMetrics>,
    max_send_drops: u64,
}

impl Router {
    /// Create a router over the given registry.
    pub fn new(
        registry: Arc<SessionRegistry>,
        presence: Arc<PresenceTracker>,
        metrics: Arc<RelayMetrics>,
        max_send_drops: u64,
    ) -> Self {
        Self {
            registry,
            presence,
            metrics,
            max_send_drops,
        }
    }

    /// Forward a frame to every named recipient with a live session.
    ///
    /// The frame is encoded once and shared across recipient queues.
    /// Recipients whose queue is full lose this frame (and are evicted
    /// once their drop budget is spent); recipients whose queue is gone
    /// are reported unavailable. Per sender-recipient pair, enqueue order
    /// here is delivery order, since each recipient queue is drained by a
    /// single writer.
    pub fn forward(&self, frame: Frame) -> DeliveryReport {
        let Frame { from, to, payload } = frame;

        // Dedupe recipients, preserving first-occurrence order
        let mut seen = HashSet::new();
        let recipients: Vec<ParticipantId> =
            to.into_iter().filter(|id| seen.insert(id.clone())).collect();

        let (found, mut unavailable) = self.registry.lookup_many(&recipients);

        if found.is_empty() {
            return DeliveryReport {
                delivered: Vec::new(),
                unavailable,
            };
        }

        let payload_len = payload.len() as u64;
        let deliver = Message::Deliver(Deliver {
            from: from.clone(),
            payload,
        });
        let bytes = match deliver.to_bytes() {
            Ok(b) => Arc::new(b),
            Err(e) => {
                tracing::error!("Failed to encode DELIVER: {}", e);
                self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                return DeliveryReport {
                    delivered: Vec::new(),
                    unavailable,
                };
            }
        };

        let mut delivered = Vec::new();
        for (id, handle) in found {
            match handle.try_send(Arc::clone(&bytes)) {
                SendOutcome::Sent => {
                    self.metrics.frames_forwarded.fetch_add(1, Ordering::Relaxed);
                    self.metrics.bytes_relayed.fetch_add(payload_len, Ordering::Relaxed);
                    self.presence.link(&from, &id);
                    delivered.push(id);
                }
                SendOutcome::Dropped => {
                    self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    let drops = handle.drop_count();
                    if drops >= self.max_send_drops {
                        tracing::warn!(
                            "Evicting slow session: id={} after {} dropped frames",
                            id,
                            drops
                        );
                        self.registry.unregister(&id, handle.connection_id());
                    }
                }
                SendOutcome::Closed => {
                    unavailable.push(id);
                }
            }
        }

        DeliveryReport {
            delivered,
            unavailable,
        }
    }
}
