//! Rate limiting for sotto-relay.
//!
//! Provides protection against connection flooding and relay spam.
//!
//! ## Design Notes
//!
//! Three layers, checked at different points:
//! - **IP address** for connection attempts, before the WebSocket upgrade
//! - **Identifier digest** (32 bytes) for relay frames, per participant
//! - **Global** across all sessions, capping aggregate throughput
//!
//! Keyed limiters use the governor crate backed by DashMap.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// How often the keyed limiter maps are shrunk.
const SHRINK_INTERVAL: Duration = Duration::from_secs(600);

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits connection attempts per client IP.
    ///
    /// Configured via `limits.connections_per_minute_per_ip`.
    connection_limiter: Arc<KeyedLimiter<IpAddr>>,

    /// Limits relay frames per participant, keyed by identifier digest.
    ///
    /// Configured via `limits.messages_per_second`.
    message_limiter: Arc<KeyedLimiter<[u8; 32]>>,

    /// Global rate limiter across all sessions.
    ///
    /// Prevents aggregate overload even if individual clients are within limits.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("connection_limiter", &"KeyedLimiter<IpAddr>")
            .field("message_limiter", &"KeyedLimiter<[u8;32]>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured values are zero.
    pub fn new(config: &LimitsConfig) -> Self {
        let connections_per_minute = NonZeroU32::new(config.connections_per_minute_per_ip)
            .expect("connections_per_minute_per_ip must be > 0");
        let connection_quota = Quota::per_minute(connections_per_minute);

        let messages_per_second = NonZeroU32::new(config.messages_per_second)
            .expect("messages_per_second must be > 0");
        let message_quota = Quota::per_second(messages_per_second);

        let global_mps = NonZeroU32::new(config.global_messages_per_second)
            .expect("global_messages_per_second must be > 0");
        let global_quota = Quota::per_second(global_mps);

        Self {
            connection_limiter: Arc::new(RateLimiter::keyed(connection_quota)),
            message_limiter: Arc::new(RateLimiter::keyed(message_quota)),
            global_limiter: Arc::new(RateLimiter::direct(global_quota)),
        }
    }

    /// Check if a connection attempt from this IP is allowed.
    pub fn check_connection(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.connection_limiter
            .check_key(&ip)
            .map_err(|_| RateLimitError::ConnectionLimitExceeded)
    }

    /// Check if a relay frame from this participant is allowed.
    ///
    /// Keyed by the 32-byte identifier digest so raw identifiers never
    /// sit in limiter tables.
    pub fn check_message(&self, digest: &[u8; 32]) -> Result<(), RateLimitError> {
        self.message_limiter
            .check_key(digest)
            .map_err(|_| RateLimitError::MessageLimitExceeded)
    }

    /// Check if the global relay rate is within limits.
    ///
    /// This is a server-wide rate limit that caps aggregate throughput
    /// regardless of individual client limits.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }

    /// Get the number of tracked connection keys (for metrics).
    pub fn connection_keys_count(&self) -> usize {
        self.connection_limiter.len()
    }

    /// Get the number of tracked message keys (for metrics).
    pub fn message_keys_count(&self) -> usize {
        self.message_limiter.len()
    }

    /// Evict stale entries from the keyed rate limiter DashMaps.
    ///
    /// Over time, departed clients leave entries in the DashMap.
    /// `retain_recent()` removes entries whose rate limit cells have fully
    /// recharged (i.e., idle clients). Called periodically from the
    /// shrink task.
    pub fn shrink(&self) {
        self.connection_limiter.retain_recent();
        self.message_limiter.retain_recent();
    }
}

/// Spawn a background task that periodically shrinks limiter state.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_shrink_task(limits: RateLimits) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Limiter shrink task started (interval: {}s)",
            SHRINK_INTERVAL.as_secs()
        );

        let mut timer = interval(SHRINK_INTERVAL);

        loop {
            timer.tick().await;

            let before = limits.connection_keys_count() + limits.message_keys_count();
            limits.shrink();
            let after = limits.connection_keys_count() + limits.message_keys_count();

            if before > after {
                tracing::debug!("Limiter shrink: evicted {} stale keys", before - after);
            } else {
                tracing::debug!("Limiter shrink: nothing to evict");
            }
        }
    })
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Too many connection attempts from this IP.
    ConnectionLimitExceeded,
    /// Too many relay frames from this participant.
    MessageLimitExceeded,
    /// Global relay rate exceeded across all sessions.
    GlobalLimitExceeded,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionLimitExceeded => {
                write!(f, "connection rate limit exceeded")
            }
            Self::MessageLimitExceeded => {
                write!(f, "message rate limit exceeded")
            }
            Self::GlobalLimitExceeded => {
                write!(f, "global rate limit exceeded")
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::net::Ipv4Addr;

    fn test_limits() -> LimitsConfig {
        Config::default().limits
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn create_rate_limits() {
        let limits = RateLimits::new(&test_limits());
        assert_eq!(limits.connection_keys_count(), 0);
        assert_eq!(limits.message_keys_count(), 0);
    }

    #[test]
    fn connection_limit_allows_within_quota() {
        let mut config = test_limits();
        config.connections_per_minute_per_ip = 5;
        let limits = RateLimits::new(&config);

        // First 5 should succeed
        for _ in 0..5 {
            assert!(limits.check_connection(ip(1)).is_ok());
        }

        // 6th should fail
        assert_eq!(
            limits.check_connection(ip(1)),
            Err(RateLimitError::ConnectionLimitExceeded)
        );
    }

    #[test]
    fn message_limit_allows_within_quota() {
        let mut config = test_limits();
        config.messages_per_second = 5;
        let limits = RateLimits::new(&config);
        let digest = [2u8; 32];

        // First 5 should succeed
        for _ in 0..5 {
            assert!(limits.check_message(&digest).is_ok());
        }

        // 6th should fail
        assert_eq!(
            limits.check_message(&digest),
            Err(RateLimitError::MessageLimitExceeded)
        );
    }

    #[test]
    fn different_keys_have_independent_limits() {
        let mut config = test_limits();
        config.messages_per_second = 2;
        let limits = RateLimits::new(&config);

        let digest_a = [1u8; 32];
        let digest_b = [2u8; 32];

        // Participant A uses its quota
        assert!(limits.check_message(&digest_a).is_ok());
        assert!(limits.check_message(&digest_a).is_ok());
        assert!(limits.check_message(&digest_a).is_err());

        // Participant B still has full quota
        assert!(limits.check_message(&digest_b).is_ok());
        assert!(limits.check_message(&digest_b).is_ok());
        assert!(limits.check_message(&digest_b).is_err());
    }

    #[test]
    fn different_ips_have_independent_limits() {
        let mut config = test_limits();
        config.connections_per_minute_per_ip = 1;
        let limits = RateLimits::new(&config);

        assert!(limits.check_connection(ip(1)).is_ok());
        assert!(limits.check_connection(ip(1)).is_err());
        assert!(limits.check_connection(ip(2)).is_ok());
    }

    #[test]
    fn global_rate_limiter_rejects_excess() {
        let mut config = test_limits();
        config.global_messages_per_second = 5;
        let limits = RateLimits::new(&config);

        // First 5 should succeed
        for _ in 0..5 {
            assert!(limits.check_global().is_ok());
        }

        // 6th should fail
        assert_eq!(
            limits.check_global(),
            Err(RateLimitError::GlobalLimitExceeded)
        );
    }

    #[test]
    fn rate_limits_are_clone() {
        let limits = RateLimits::new(&test_limits());
        let _cloned = limits.clone();
    }

    #[test]
    fn rate_limits_are_debug() {
        let limits = RateLimits::new(&test_limits());
        let debug = format!("{:?}", limits);
        assert!(debug.contains("RateLimits"));
    }

    #[test]
    fn rate_limit_error_display() {
        assert_eq!(
            RateLimitError::ConnectionLimitExceeded.to_string(),
            "connection rate limit exceeded"
        );
        assert_eq!(
            RateLimitError::MessageLimitExceeded.to_string(),
            "message rate limit exceeded"
        );
        assert_eq!(
            RateLimitError::GlobalLimitExceeded.to_string(),
            "global rate limit exceeded"
        );
    }

    #[test]
    fn shrink_does_not_panic() {
        let limits = RateLimits::new(&test_limits());

        // Create some entries
        let _ = limits.check_connection(ip(1));
        let _ = limits.check_connection(ip(2));
        let _ = limits.check_message(&[1u8; 32]);

        assert!(limits.connection_keys_count() > 0);

        // Freshly used entries may or may not be evicted depending on
        // timing, so we only assert no panic
        limits.shrink();
    }
}
