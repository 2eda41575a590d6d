//! Gateway events emitted by the connection layer.
//!
//! Every connection lifecycle transition and every inbound client message
//! publishes a [`GatewayEvent`] through the [`super::EventBus`]. The relay
//! loop in the service layer consumes them and turns them into registry
//! dispatches.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ConnectionKey;
use super::connection::Payload;

/// Event emitted by the WebSocket layer onto the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A connection completed its handshake and was registered.
    ConnectionOpened {
        /// Key the connection was registered under.
        key: ConnectionKey,
        /// Registration timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A connection closed and was removed from the registry.
    ConnectionClosed {
        /// Key the connection was registered under.
        key: ConnectionKey,
        /// Teardown timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A client sent a message to be relayed to its peers.
    MessageReceived {
        /// Key of the connection the message arrived on.
        origin: ConnectionKey,
        /// Client-chosen event name.
        event: String,
        /// Message body.
        payload: Payload,
        /// Arrival timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Returns the connection key this event concerns.
    #[must_use]
    pub fn key(&self) -> &ConnectionKey {
        match self {
            Self::ConnectionOpened { key, .. } | Self::ConnectionClosed { key, .. } => key,
            Self::MessageReceived { origin, .. } => origin,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ConnectionOpened { .. } => "connection_opened",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::MessageReceived { .. } => "message_received",
        }
    }
}
