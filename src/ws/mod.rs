//! WebSocket layer: connection handling and wire message types.
//!
//! The WebSocket endpoint at `/ws` is how connections enter the registry.
//! Each socket gets a [`connection::WsConnection`] handle registered under
//! its endpoint key; everything sent to it by the registry is queued here
//! and drained onto the wire.

pub mod connection;
pub mod handler;
pub mod messages;
