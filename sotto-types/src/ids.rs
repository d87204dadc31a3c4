//! Identity types for the Sotto relay protocol.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many characters of the digest appear in log output.
const DIGEST_DISPLAY_LEN: usize = 12;

/// An opaque identifier a client presents when joining.
///
/// The relay routes on the identifier verbatim but never writes it to logs:
/// `Display` and `Debug` both render a truncated SHA-256 digest instead, so
/// identifiers (which clients may derive from usernames or phone numbers)
/// stay out of log aggregation. Use [`ParticipantId::as_str`] only for
/// routing and wire encoding.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a ParticipantId from a client-supplied token.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    /// Get the raw identifier string. Do not log this.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length of the raw identifier.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Full SHA-256 digest of the identifier.
    ///
    /// Used as a rate limiter key so limiter state never holds raw
    /// identifiers either.
    pub fn digest(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"sotto-participant-v1");
        hasher.update(self.0.as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        bytes
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = URL_SAFE_NO_PAD.encode(self.digest());
        write!(f, "{}", &encoded[..DIGEST_DISPLAY_LEN])
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({self})")
    }
}

/// A unique identifier for one accepted transport connection.
///
/// UUID v4 format. Distinguishes successive connections that present the
/// same participant identifier, so teardown can prove it is removing its
/// own registry entry rather than a successor's.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Create a new random ConnectionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}
