//! # sotto-relay
//!
//! End-to-end encrypted message relay server for Sotto.
//!
//! This crate implements a relay server that:
//! - Accepts WebSocket connections from multiple clients
//! - Routes encrypted payloads between live sessions by identifier
//! - Reports presence changes and unavailable recipients
//! - Never sees plaintext and never stores a payload (relay is a "dumb pipe")
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐                    ┌── Client B
//!            │     WebSocket      │
//!            ├───────────────────►│
//!            │                    │
//!        ┌───┴────────────────────┴───┐
//!        │        sotto-relay         │
//!        │  ┌─────────────────────┐   │
//!        │  │  session registry   │   │
//!        │  │   (in-memory only)  │   │
//!        │  └─────────────────────┘   │
//!        └────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Clients speak MessagePack over binary WebSocket frames:
//! - JOIN → WELCOME (claim an identifier)
//! - RELAY → DELIVER (forward payload to recipients)
//! - NOTICE (server → client, presence and delivery events)
//! - LEAVE (graceful disconnect)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod limits;
pub mod presence;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod transport;
