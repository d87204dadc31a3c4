//! Error types for sotto-relay.

use sotto_types::ParticipantId;

/// Main error type for relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session registry errors.
///
/// Identifiers render through their digest form, so registry errors are
/// safe to log verbatim.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Identifier already claimed by a live session.
    #[error("duplicate identifier: {id}")]
    DuplicateIdentifier {
        /// The identifier that is already registered.
        id: ParticipantId,
    },

    /// No live session holds this identifier.
    #[error("identifier not registered: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: ParticipantId,
    },
}

/// Protocol layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Invalid message format.
    #[error("invalid message format: {reason}")]
    InvalidMessage {
        /// Reason the message is invalid.
        reason: String,
    },

    /// Message encoding or decoding failed.
    #[error("wire error: {0}")]
    Wire(#[from] sotto_types::WireError),

    /// Unexpected message type.
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected message type.
        expected: String,
        /// Actual message type received.
        actual: String,
    },

    /// Session has not joined yet.
    #[error("session not joined: JOIN required first")]
    NotJoined,

    /// Protocol version mismatch.
    #[error("protocol version mismatch: client={client}, server={server}")]
    VersionMismatch {
        /// Client protocol version.
        client: u8,
        /// Server protocol version.
        server: u8,
    },

    /// Frame exceeds the configured size limit.
    #[error("frame too large: {size} bytes (limit: {limit} bytes)")]
    FrameTooLarge {
        /// Actual size of the frame.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// Relay names more recipients than allowed.
    #[error("too many recipients: {count} (limit: {limit})")]
    TooManyRecipients {
        /// Number of recipients named.
        count: usize,
        /// Maximum allowed recipients.
        limit: usize,
    },

    /// Identifier failed validation.
    #[error("invalid identifier: {reason}")]
    InvalidIdentifier {
        /// Reason the identifier is invalid.
        reason: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {reason}")]
    RateLimited {
        /// Reason for rate limiting.
        reason: String,
    },
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
