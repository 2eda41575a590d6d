//! fanout-gateway server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket endpoint and the REST
//! admin surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fanout_gateway::api;
use fanout_gateway::app_state::AppState;
use fanout_gateway::config::GatewayConfig;
use fanout_gateway::domain::{ConnectionRegistry, EventBus};
use fanout_gateway::service::{DispatchService, RelayPolicy};
use fanout_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    tracing::info!(addr = %config.listen_addr, "starting fanout-gateway");

    // Build domain layer
    let registry = Arc::new(ConnectionRegistry::new());
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Build service layer
    let policy = RelayPolicy {
        relay_messages: config.relay_enabled,
        presence_events: config.presence_events_enabled,
    };
    let dispatch = Arc::new(DispatchService::new(
        Arc::clone(&registry),
        event_bus.clone(),
        policy,
    ));

    // Run the relay loop for the life of the process
    let relay = Arc::clone(&dispatch);
    let relay_rx = event_bus.subscribe();
    tokio::spawn(async move { relay.run_relay(relay_rx).await });

    // Build application state
    let app_state = AppState {
        registry,
        dispatch,
        event_bus,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
