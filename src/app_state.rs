//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{ConnectionRegistry, EventBus};
use crate::service::DispatchService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection registry holding every live connection.
    pub registry: Arc<ConnectionRegistry>,
    /// Dispatch service for the admin surface and relay loop.
    pub dispatch: Arc<DispatchService>,
    /// Event bus carrying lifecycle and inbound-message events.
    pub event_bus: EventBus,
}
