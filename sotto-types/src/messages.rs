//! Protocol messages for the Sotto relay.
//!
//! Messages travel as MessagePack inside binary WebSocket frames. The relay
//! reads only routing fields; payload bytes pass through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ParticipantId, WireError};

/// Current protocol version. A `join` carrying any other version is refused.
pub const PROTOCOL_VERSION: u8 = 1;

/// All protocol messages, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    /// First message after connect: claim an identifier
    Join(Join),
    /// Server response to a successful join
    Welcome(Welcome),
    /// Ask the relay to forward a payload
    Relay(Relay),
    /// A forwarded payload (server to client)
    Deliver(Deliver),
    /// Presence or error notification (server to client)
    Notice(Notice),
    /// Graceful disconnect
    Leave(Leave),
}

impl Message {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// Short name of the message kind, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join(_) => "join",
            Message::Welcome(_) => "welcome",
            Message::Relay(_) => "relay",
            Message::Deliver(_) => "deliver",
            Message::Notice(_) => "notice",
            Message::Leave(_) => "leave",
        }
    }
}

/// First message a client sends after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Protocol version (currently 1)
    pub version: u8,
    /// The identifier this client wants to be reachable under
    pub identifier: ParticipantId,
}

/// Server response confirming a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// Protocol version supported by the server
    pub version: u8,
}

/// Ask the relay to forward an opaque payload to one or more recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    /// Recipient identifier, or a list for group fan-out
    pub to: Recipients,
    /// Encrypted payload (opaque to the relay)
    pub payload: Payload,
}

/// A payload forwarded to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliver {
    /// Who sent it
    pub from: ParticipantId,
    /// The payload, byte-for-byte as sent
    pub payload: Payload,
}

/// Presence or error notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// What happened
    pub event: NoticeEvent,
    /// The identifier the event is about
    pub detail: ParticipantId,
}

/// Graceful disconnect message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    /// Optional reason for disconnect
    pub reason: Option<String>,
}

/// One recipient or a group of recipients.
///
/// Untagged: a single identifier encodes as a string, a group as an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    /// A single recipient
    One(ParticipantId),
    /// A group of recipients
    Many(Vec<ParticipantId>),
}

impl Recipients {
    /// Number of recipients named (before deduplication).
    pub fn len(&self) -> usize {
        match self {
            Recipients::One(_) => 1,
            Recipients::Many(ids) => ids.len(),
        }
    }

    /// Whether no recipient is named at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a recipient list.
    pub fn into_vec(self) -> Vec<ParticipantId> {
        match self {
            Recipients::One(id) => vec![id],
            Recipients::Many(ids) => ids,
        }
    }
}

impl From<ParticipantId> for Recipients {
    fn from(id: ParticipantId) -> Self {
        Recipients::One(id)
    }
}

impl From<Vec<ParticipantId>> for Recipients {
    fn from(ids: Vec<ParticipantId>) -> Self {
        Recipients::Many(ids)
    }
}

/// Events reported in a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeEvent {
    /// A peer this client exchanged frames with has disconnected
    PeerLeft,
    /// A recipient this client was waiting for has joined
    PeerOnline,
    /// A relayed frame named a recipient with no live session
    RecipientUnavailable,
    /// The identifier in a join is already claimed by a live session
    DuplicateIdentifier,
}

/// Opaque encrypted payload bytes.
///
/// `Debug` prints only the length: payload content must never reach logs,
/// even through a stray `{:?}` on a whole [`Message`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Wrap payload bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload([{} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_roundtrip() {
        let msg = Message::Join(Join {
            version: PROTOCOL_VERSION,
            identifier: ParticipantId::new("alice"),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        assert_eq!(restored, msg);
    }

    #[test]
    fn welcome_roundtrip() {
        let msg = Message::Welcome(Welcome {
            version: PROTOCOL_VERSION,
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        assert_eq!(restored, msg);
    }

    #[test]
    fn relay_single_recipient_roundtrip() {
        let msg = Message::Relay(Relay {
            to: ParticipantId::new("bob").into(),
            payload: Payload::new(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        if let Message::Relay(relay) = restored {
            assert_eq!(relay.to, Recipients::One(ParticipantId::new("bob")));
            assert_eq!(relay.payload.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        } else {
            panic!("expected relay message");
        }
    }

    #[test]
    fn relay_group_recipients_roundtrip() {
        let group = vec![
            ParticipantId::new("bob"),
            ParticipantId::new("carol"),
            ParticipantId::new("dave"),
        ];
        let msg = Message::Relay(Relay {
            to: group.clone().into(),
            payload: Payload::new(vec![1, 2, 3]),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        if let Message::Relay(relay) = restored {
            assert_eq!(relay.to.into_vec(), group);
        } else {
            panic!("expected relay message");
        }
    }

    #[test]
    fn deliver_preserves_payload_bytes() {
        let payload: Vec<u8> = (0..=255).collect();
        let msg = Message::Deliver(Deliver {
            from: ParticipantId::new("alice"),
            payload: payload.clone().into(),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        if let Message::Deliver(deliver) = restored {
            assert_eq!(deliver.payload.as_bytes(), payload.as_slice());
        } else {
            panic!("expected deliver message");
        }
    }

    #[test]
    fn notice_roundtrip() {
        let msg = Message::Notice(Notice {
            event: NoticeEvent::RecipientUnavailable,
            detail: ParticipantId::new("bob"),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        assert_eq!(restored, msg);
    }

    #[test]
    fn notice_events_use_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&NoticeEvent::PeerLeft).unwrap();
        assert_eq!(json, "\"peer-left\"");
        let json = serde_json::to_string(&NoticeEvent::PeerOnline).unwrap();
        assert_eq!(json, "\"peer-online\"");
        let json = serde_json::to_string(&NoticeEvent::RecipientUnavailable).unwrap();
        assert_eq!(json, "\"recipient-unavailable\"");
        let json = serde_json::to_string(&NoticeEvent::DuplicateIdentifier).unwrap();
        assert_eq!(json, "\"duplicate-identifier\"");
    }

    #[test]
    fn message_tags_use_kebab_case() {
        let msg = Message::Join(Join {
            version: 1,
            identifier: ParticipantId::new("alice"),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join\""));
    }

    #[test]
    fn leave_with_reason() {
        let msg = Message::Leave(Leave {
            reason: Some("client shutdown".into()),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        if let Message::Leave(leave) = restored {
            assert_eq!(leave.reason.as_deref(), Some("client shutdown"));
        } else {
            panic!("expected leave message");
        }
    }

    #[test]
    fn leave_without_reason() {
        let msg = Message::Leave(Leave { reason: None });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        if let Message::Leave(leave) = restored {
            assert!(leave.reason.is_none());
        } else {
            panic!("expected leave message");
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(Message::from_bytes(&[0xFF, 0x00, 0x13, 0x37]).is_err());
        assert!(Message::from_bytes(&[]).is_err());
    }

    #[test]
    fn payload_debug_redacts_content() {
        let payload = Payload::new(vec![0xAB; 64]);
        let debug = format!("{:?}", payload);
        assert_eq!(debug, "Payload([64 bytes])");
        assert!(!debug.contains("171")); // 0xAB = 171

        // Redaction holds through the enclosing message too
        let msg = Message::Deliver(Deliver {
            from: ParticipantId::new("alice"),
            payload,
        });
        let debug = format!("{:?}", msg);
        assert!(debug.contains("[64 bytes]"));
        assert!(!debug.contains("alice"));
    }

    #[test]
    fn recipients_len_and_empty() {
        let one = Recipients::One(ParticipantId::new("bob"));
        assert_eq!(one.len(), 1);
        assert!(!one.is_empty());

        let none = Recipients::Many(vec![]);
        assert_eq!(none.len(), 0);
        assert!(none.is_empty());
    }

    #[test]
    fn protocol_version_is_one() {
        assert_eq!(PROTOCOL_VERSION, 1);
    }
}
