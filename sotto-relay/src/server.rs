//! Main Relay server coordination.
//!
//! Relay owns the registry, presence tracker, router, rate limiters, and
//! metrics shared by every session task.

use crate::config::Config;
use crate::limits::RateLimits;
use crate::presence::PresenceTracker;
use crate::registry::{SendOutcome, SessionRegistry};
use crate::router::Router;
use sotto_types::{Message, Notice, NoticeEvent, ParticipantId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64` — no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total connections accepted (before session establishment).
    pub connections_total: AtomicU64,
    /// Total sessions that completed a JOIN.
    pub joins_total: AtomicU64,
    /// Total frames enqueued for delivery.
    pub frames_forwarded: AtomicU64,
    /// Total recipient misses reported back to senders.
    pub frames_unavailable: AtomicU64,
    /// Total frames dropped on full recipient queues.
    pub frames_dropped: AtomicU64,
    /// Total ciphertext payload bytes relayed.
    pub bytes_relayed: AtomicU64,
    /// Total rate limit rejections (connection + message + global).
    pub rate_limit_hits: AtomicU64,
    /// Total protocol errors (invalid messages, version mismatches, etc.).
    pub errors_total: AtomicU64,
}

/// Main relay server state.
pub struct Relay {
    config: Config,
    registry: Arc<SessionRegistry>,
    presence: Arc<PresenceTracker>,
    router: Router,
    /// Rate limiters for connections and relay frames.
    rate_limits: RateLimits,
    /// Operational metrics (counters, gauges).
    metrics: Arc<RelayMetrics>,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("sessions_count", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Create a new Relay with the given config.
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let presence = Arc::new(PresenceTracker::new());
        let metrics = Arc::new(RelayMetrics::default());
        let rate_limits = RateLimits::new(&config.limits);
        let router = Router::new(
            Arc::clone(&registry),
            Arc::clone(&presence),
            Arc::clone(&metrics),
            config.limits.max_send_drops,
        );

        Self {
            config,
            registry,
            presence,
            router,
            rate_limits,
            metrics,
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Get access to the presence tracker.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Get access to the frame router.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Send a notice to each target that still has a live session.
    ///
    /// Fire-and-forget: the notice is encoded once and enqueued without
    /// waiting. Targets that are gone or backed up simply miss it.
    pub fn notify(&self, targets: &[ParticipantId], event: NoticeEvent, detail: &ParticipantId) {
        if targets.is_empty() {
            return;
        }

        let notice = Message::Notice(Notice {
            event,
            detail: detail.clone(),
        });

        let bytes = match notice.to_bytes() {
            Ok(b) => Arc::new(b),
            Err(e) => {
                tracing::error!("Failed to serialize NOTICE: {}", e);
                self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let mut sent = 0;
        for target in targets {
            if let Ok(handle) = self.registry.lookup(target) {
                if handle.try_send(Arc::clone(&bytes)) == SendOutcome::Sent {
                    sent += 1;
                }
            }
        }

        tracing::debug!(
            "Sent {:?} notice about {} to {}/{} sessions",
            event,
            detail,
            sent,
            targets.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PeerHandle;
    use sotto_types::ConnectionId;
    use tokio::sync::mpsc;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn new_relay_starts_empty() {
        let relay = Relay::new(Config::default());
        assert!(relay.registry().is_empty());
        assert_eq!(relay.metrics().connections_total.load(Ordering::Relaxed), 0);
        assert_eq!(relay.metrics().frames_forwarded.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn relay_is_debug() {
        let relay = Relay::new(Config::default());
        let debug = format!("{:?}", relay);
        assert!(debug.contains("Relay"));
        assert!(debug.contains("sessions_count"));
    }

    #[tokio::test]
    async fn notify_reaches_registered_targets() {
        let relay = Relay::new(Config::default());
        let (tx, mut rx) = mpsc::channel(4);
        relay
            .registry()
            .register(id("bob"), PeerHandle::new(ConnectionId::new(), tx))
            .unwrap();

        relay.notify(&[id("bob")], NoticeEvent::PeerLeft, &id("alice"));

        let bytes = rx.recv().await.unwrap();
        match Message::from_bytes(&bytes).unwrap() {
            Message::Notice(notice) => {
                assert_eq!(notice.event, NoticeEvent::PeerLeft);
                assert_eq!(notice.detail, id("alice"));
            }
            other => panic!("expected notice, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn notify_skips_missing_targets() {
        let relay = Relay::new(Config::default());

        // No session registered: must not panic or error
        relay.notify(&[id("ghost")], NoticeEvent::PeerOnline, &id("bob"));
    }

    #[test]
    fn notify_with_no_targets_is_noop() {
        let relay = Relay::new(Config::default());
        relay.notify(&[], NoticeEvent::PeerLeft, &id("alice"));
    }
}
