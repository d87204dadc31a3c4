//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// Message could not be serialized to MessagePack
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// Bytes could not be deserialized as a protocol message
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn deserialization_error_display() {
        let err = Message::from_bytes(&[0xC1]).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("deserialization failed"));
    }

    #[test]
    fn wire_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
