//! Connection capability interface consumed by the registry.
//!
//! The registry is polymorphic over anything implementing
//! [`ConnectionHandle`]: it never touches wire bytes, framing, or reconnect
//! logic. The concrete WebSocket implementation lives in
//! [`crate::ws::connection`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConnectionKey;
use crate::error::GatewayError;

/// Message body handed to [`ConnectionHandle::send`].
///
/// Either a plain text payload or arbitrary structured data. Serializes
/// untagged, so `"hello"` and `{"a": 1}` round-trip to the natural JSON
/// shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Plain text body.
    Text(String),
    /// Structured JSON body.
    Data(serde_json::Value),
}

impl Payload {
    /// Creates a text payload.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// Creates a structured payload.
    #[must_use]
    pub fn data(value: serde_json::Value) -> Self {
        Self::Data(value)
    }
}

/// Minimal capability interface for one open bidirectional connection.
///
/// The four operations the [`super::ConnectionRegistry`] invokes. Everything
/// else about a connection (handshake, framing, reconnection, event
/// emission) belongs to the implementation.
pub trait ConnectionHandle: Send + Sync + fmt::Debug {
    /// Stable identifying address, assigned at creation and immutable for
    /// the handle's lifetime.
    fn key(&self) -> &ConnectionKey;

    /// Returns `true` iff the connection is currently open and able to
    /// accept sends.
    fn is_ready(&self) -> bool;

    /// Best-effort asynchronous send. Enqueues the message for delivery
    /// and returns without blocking; delivery is not confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionClosed`] if the connection can no
    /// longer accept messages.
    fn send(&self, event: &str, payload: Payload) -> Result<(), GatewayError>;

    /// Initiates connection teardown. Idempotent.
    fn disconnect(&self);
}
