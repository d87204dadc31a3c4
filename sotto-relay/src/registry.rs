//! Identifier to session routing table.
//!
//! The registry maps each claimed identifier to a handle on the owning
//! session's outbound queue. Registration is first-come-first-served: a
//! second session claiming a live identifier is rejected, never swapped in.

use crate::error::{RegistryError, RegistryResult};
use dashmap::DashMap;
use sotto_types::{ConnectionId, ParticipantId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of a non-blocking enqueue onto a session's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame accepted onto the queue.
    Sent,
    /// Queue full, frame dropped.
    Dropped,
    /// Session's queue is gone (session closing or closed).
    Closed,
}

/// Handle to a live session's outbound queue.
///
/// Frames are pre-encoded and shared via `Arc`, so fan-out to many
/// recipients enqueues the same buffer without copying it.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    connection_id: ConnectionId,
    tx: mpsc::Sender<Arc<Vec<u8>>>,
    drops: Arc<AtomicU64>,
}

impl PeerHandle {
    /// Create a handle around a session's outbound queue sender.
    pub fn new(connection_id: ConnectionId, tx: mpsc::Sender<Arc<Vec<u8>>>) -> Self {
        Self {
            connection_id,
            tx,
            drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The connection that owns this queue.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Enqueue a frame without waiting.
    ///
    /// A full queue drops the frame and counts the drop; it never blocks
    /// the caller. A sender must not stall because one recipient reads
    /// slowly.
    pub fn try_send(&self, frame: Arc<Vec<u8>>) -> SendOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Total frames dropped on this queue since the session joined.
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

/// Concurrent identifier to session map.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<ParticipantId, PeerHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an identifier for a session.
    ///
    /// The entry lock makes this atomic: of two sessions racing to claim
    /// the same identifier, exactly one wins.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateIdentifier`] if a live session
    /// already holds the identifier. The existing registration is untouched.
    pub fn register(&self, id: ParticipantId, handle: PeerHandle) -> RegistryResult<()> {
        match self.sessions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(RegistryError::DuplicateIdentifier {
                    id: entry.key().clone(),
                })
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let id = entry.key().clone();
                entry.insert(handle);
                tracing::debug!("Registered session: id={} (total: {})", id, self.sessions.len());
                Ok(())
            }
        }
    }

    /// Release an identifier, but only if it is still held by the given
    /// connection.
    ///
    /// The connection check keeps a late close from clobbering a fresh
    /// registration after the identifier was reclaimed. Idempotent:
    /// returns `false` when nothing was removed.
    pub fn unregister(&self, id: &ParticipantId, connection_id: ConnectionId) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, handle| handle.connection_id() == connection_id)
            .is_some();

        if removed {
            tracing::debug!(
                "Unregistered session: id={} (remaining: {})",
                id,
                self.sessions.len()
            );
        }

        removed
    }

    /// Look up the handle for an identifier.
    ///
    /// The handle is cloned out so no map lock is held while the caller
    /// enqueues frames.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no live session holds the
    /// identifier.
    pub fn lookup(&self, id: &ParticipantId) -> RegistryResult<PeerHandle> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound { id: id.clone() })
    }

    /// Look up many identifiers at once, partitioning into found handles
    /// and missing identifiers.
    pub fn lookup_many(
        &self,
        ids: &[ParticipantId],
    ) -> (Vec<(ParticipantId, PeerHandle)>, Vec<ParticipantId>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();

        for id in ids {
            match self.sessions.get(id) {
                Some(entry) => found.push((id.clone(), entry.value().clone())),
                None => missing.push(id.clone()),
            }
        }

        (found, missing)
    }

    /// Whether a live session holds this identifier.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
