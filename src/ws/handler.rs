//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::ConnectionKey;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Optional client-chosen connection key.
    pub key: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The connection registers under `?key=` when provided and non-empty,
/// otherwise under its peer socket address.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let key = query
        .key
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| addr.to_string());

    ws.on_upgrade(move |socket| run_connection(socket, ConnectionKey::new(key), state))
}
