//! Connection admin handlers: list, inspect, disconnect.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ConnectionDto, ConnectionListResponse, DisconnectAllResponse};
use crate::app_state::AppState;
use crate::domain::ConnectionKey;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /connections` — List all registered connections.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Connections",
    summary = "List registered connections",
    description = "Returns a snapshot of every registered connection with its key and readiness.",
    responses(
        (status = 200, description = "Connection snapshot", body = ConnectionListResponse),
    )
)]
pub async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    let data: Vec<ConnectionDto> = state
        .dispatch
        .list_connections()
        .await
        .into_iter()
        .map(ConnectionDto::from)
        .collect();
    let total = data.len();
    Json(ConnectionListResponse { data, total })
}

/// `GET /connections/{key}` — Inspect a single connection.
///
/// # Errors
///
/// Returns [`GatewayError::ConnectionNotFound`] if no connection is
/// registered under the key.
#[utoipa::path(
    get,
    path = "/api/v1/connections/{key}",
    tag = "Connections",
    summary = "Get one connection",
    description = "Returns the key and readiness of the connection registered under the given key.",
    responses(
        (status = 200, description = "Connection found", body = ConnectionDto),
        (status = 404, description = "No such connection", body = ErrorResponse),
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    match state.dispatch.get_connection(&key).await {
        Some(info) => Ok(Json(ConnectionDto::from(info))),
        None => Err(GatewayError::ConnectionNotFound(ConnectionKey::new(key))),
    }
}

/// `DELETE /connections/{key}` — Disconnect and forget one connection.
///
/// # Errors
///
/// Returns [`GatewayError::ConnectionNotFound`] if no connection is
/// registered under the key.
#[utoipa::path(
    delete,
    path = "/api/v1/connections/{key}",
    tag = "Connections",
    summary = "Disconnect one connection",
    description = "Tears down the connection registered under the given key and removes it from the registry.",
    responses(
        (status = 204, description = "Connection disconnected"),
        (status = 404, description = "No such connection", body = ErrorResponse),
    )
)]
pub async fn disconnect_connection(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    state.dispatch.disconnect(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /connections` — Disconnect every registered connection.
#[utoipa::path(
    delete,
    path = "/api/v1/connections",
    tag = "Connections",
    summary = "Disconnect all connections",
    description = "Tears down every registered connection and clears the registry.",
    responses(
        (status = 200, description = "All connections disconnected", body = DisconnectAllResponse),
    )
)]
pub async fn disconnect_all(State(state): State<AppState>) -> impl IntoResponse {
    let disconnected = state.dispatch.disconnect_all().await;
    Json(DisconnectAllResponse { disconnected })
}

/// Connection routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/connections",
            get(list_connections).delete(disconnect_all),
        )
        .route(
            "/connections/{key}",
            get(get_connection).delete(disconnect_connection),
        )
}
