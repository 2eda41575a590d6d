//! Connection inspection and teardown DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionKey;
use crate::service::ConnectionInfo;

/// One registered connection as reported by the admin surface.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionDto {
    /// Key the connection is registered under.
    #[schema(value_type = String)]
    pub key: ConnectionKey,
    /// Whether the connection currently accepts sends.
    pub ready: bool,
}

impl From<ConnectionInfo> for ConnectionDto {
    fn from(info: ConnectionInfo) -> Self {
        Self {
            key: info.key,
            ready: info.ready,
        }
    }
}

/// Response body for `GET /connections`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    /// Every registered connection.
    pub data: Vec<ConnectionDto>,
    /// Total number of registered connections.
    pub total: usize,
}

/// Response body for `DELETE /connections`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisconnectAllResponse {
    /// Number of connections disconnected.
    pub disconnected: usize,
}
