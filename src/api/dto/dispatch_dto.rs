//! Broadcast and multicast dispatch DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ConnectionKey, Payload};

/// Request body for `POST /broadcast`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    /// Event name delivered to every ready connection.
    pub event: String,
    /// Message body: a JSON string or arbitrary structured data.
    #[schema(value_type = Object)]
    pub payload: Payload,
}

/// Request body for `POST /multicast`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MulticastRequest {
    /// Event name delivered to every ready, non-excluded connection.
    pub event: String,
    /// Message body: a JSON string or arbitrary structured data.
    #[schema(value_type = Object)]
    pub payload: Payload,
    /// Connection keys excluded from delivery. An empty list makes the
    /// request equivalent to a broadcast.
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub exclude: Vec<ConnectionKey>,
}

/// Response body for the dispatch endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchResponse {
    /// Event name echoed from the request.
    pub event: String,
    /// Number of connections that accepted the send.
    pub delivered: usize,
    /// Dispatch timestamp.
    pub timestamp: DateTime<Utc>,
}
