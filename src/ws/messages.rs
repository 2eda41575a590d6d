//! WebSocket wire types: the outbound frame envelope and inbound client
//! messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Payload;

/// Server → Client frame envelope.
///
/// Every message dispatched through the registry is wrapped in one of these
/// before it hits the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Server-generated frame ID.
    pub id: String,
    /// Event name (e.g. `"connection.opened"` or a client-chosen name).
    pub event: String,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Message body.
    pub payload: Payload,
}

impl Frame {
    /// Builds a frame for `event`/`payload` with a fresh ID and the current
    /// timestamp.
    #[must_use]
    pub fn new(event: &str, payload: Payload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds the error frame sent back for unparseable client input.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self::new(
            "gateway.error",
            Payload::Data(serde_json::json!({
                "code": 400,
                "message": message,
            })),
        )
    }
}

/// Client → Server message: an event name plus a body to relay to the
/// sender's peers.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    /// Client-chosen event name.
    pub event: String,
    /// Message body.
    pub payload: Payload,
}
