//! System endpoints: health check and gateway stats.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Gateway statistics snapshot.
#[derive(Debug, Serialize, ToSchema)]
struct StatsResponse {
    connections: usize,
    ready: usize,
    relay_subscribers: usize,
}

/// `GET /stats` — Registry and event bus statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Gateway statistics",
    description = "Returns the number of registered connections, how many are ready, and the number of active event bus subscribers.",
    responses(
        (status = 200, description = "Current statistics", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let infos = state.dispatch.list_connections().await;
    let ready = infos.iter().filter(|info| info.ready).count();

    Json(StatsResponse {
        connections: infos.len(),
        ready,
        relay_subscribers: state.event_bus.receiver_count(),
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
