//! Dispatch handlers: broadcast and multicast.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{BroadcastRequest, DispatchResponse, MulticastRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /broadcast` — Send an event to every ready connection.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the event name is empty.
#[utoipa::path(
    post,
    path = "/api/v1/broadcast",
    tag = "Dispatch",
    summary = "Broadcast to all ready connections",
    description = "Delivers the event and payload to every registered connection that currently accepts sends. Not-ready connections are skipped; delivery is best-effort with no acknowledgement.",
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Dispatch issued", body = DispatchResponse),
        (status = 400, description = "Empty event name", body = ErrorResponse),
    )
)]
pub async fn broadcast(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let delivered = state.dispatch.broadcast(&req.event, req.payload).await?;

    Ok(Json(DispatchResponse {
        event: req.event,
        delivered,
        timestamp: Utc::now(),
    }))
}

/// `POST /multicast` — Send an event to all ready connections except an
/// excluded set of keys.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the event name is empty.
#[utoipa::path(
    post,
    path = "/api/v1/multicast",
    tag = "Dispatch",
    summary = "Multicast with exclusions",
    description = "Delivers the event and payload to every ready connection whose key is not in `exclude`. An empty exclusion list behaves like a broadcast; excluded connections stay registered.",
    request_body = MulticastRequest,
    responses(
        (status = 200, description = "Dispatch issued", body = DispatchResponse),
        (status = 400, description = "Empty event name", body = ErrorResponse),
    )
)]
pub async fn multicast(
    State(state): State<AppState>,
    Json(req): Json<MulticastRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let delivered = state
        .dispatch
        .multicast(&req.exclude, &req.event, req.payload)
        .await?;

    Ok(Json(DispatchResponse {
        event: req.event,
        delivered,
        timestamp: Utc::now(),
    }))
}

/// Dispatch routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/broadcast", post(broadcast))
        .route("/multicast", post(multicast))
}
