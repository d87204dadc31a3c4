//! Identifier availability endpoint.
//!
//! Lets a client probe whether an identifier is currently claimed before
//! attempting to join. The answer is advisory: another client can claim
//! the identifier between the probe and the join.

use crate::server::Relay;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use sotto_types::ParticipantId;
use std::sync::Arc;

/// Availability probe response.
#[derive(Debug, Serialize)]
pub struct AvailabilityStatus {
    /// True when no active session holds the identifier.
    pub available: bool,
}

/// Availability probe handler.
///
/// Returns `200 OK` when the identifier is free and `409 Conflict` when an
/// active session already holds it.
pub async fn availability_handler(
    Path(identifier): Path<String>,
    Extension(relay): Extension<Arc<Relay>>,
) -> (StatusCode, Json<AvailabilityStatus>) {
    let id = ParticipantId::new(identifier);
    let available = !relay.registry().contains(&id);

    let status = if available {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };

    (status, Json(AvailabilityStatus { available }))
}
