//! Service layer: dispatch orchestration.
//!
//! [`DispatchService`] fronts the registry for the admin surface and runs
//! the relay loop that turns [`super::domain::EventBus`] events into
//! registry dispatches.

pub mod dispatch_service;

pub use dispatch_service::{ConnectionInfo, DispatchService, RelayPolicy};
