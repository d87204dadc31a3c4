//! # sotto-types
//!
//! Wire format types for the Sotto encrypted relay protocol.
//!
//! This crate provides the foundational types shared by the relay server and
//! its clients:
//! - [`ParticipantId`], [`ConnectionId`] - Identity types
//! - [`Message`] - Protocol messages (Join, Relay, Deliver, etc.)
//! - [`WireError`] - Encoding error types
//!
//! Payloads are end-to-end encrypted by clients; nothing in this crate can
//! decrypt them, and the types are written so that accidental logging of a
//! message never exposes payload bytes or raw identifiers.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;

pub use error::WireError;
pub use ids::{ConnectionId, ParticipantId};
pub use messages::{
    Deliver, Join, Leave, Message, Notice, NoticeEvent, Payload, Recipients, Relay, Welcome,
    PROTOCOL_VERSION,
};
