//! Dispatch service: orchestrates registry fan-out and the relay loop.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::{ConnectionKey, ConnectionRegistry, EventBus, GatewayEvent, Payload};
use crate::error::GatewayError;

/// What the relay loop fans back out to connected clients.
#[derive(Debug, Clone, Copy)]
pub struct RelayPolicy {
    /// Relay inbound client messages to the sender's peers.
    pub relay_messages: bool,
    /// Fan out `connection.opened` / `connection.closed` presence events.
    pub presence_events: bool,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            relay_messages: true,
            presence_events: true,
        }
    }
}

/// Snapshot of one registry entry, as exposed to the admin surface.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Key the connection is registered under.
    pub key: ConnectionKey,
    /// Whether the connection currently accepts sends.
    pub ready: bool,
}

/// Orchestration layer over the [`ConnectionRegistry`].
///
/// Stateless coordinator: owns a shared reference to the registry for
/// dispatch and the [`EventBus`] feeding the relay loop. REST handlers call
/// the request/response methods; [`run_relay`](Self::run_relay) runs for the
/// life of the process.
#[derive(Debug)]
pub struct DispatchService {
    registry: Arc<ConnectionRegistry>,
    event_bus: EventBus,
    policy: RelayPolicy,
}

impl DispatchService {
    /// Creates a new `DispatchService`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, event_bus: EventBus, policy: RelayPolicy) -> Self {
        Self {
            registry,
            event_bus,
            policy,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Sends `event`/`payload` to every ready connection. Returns the
    /// number of accepted sends.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `event` is empty.
    pub async fn broadcast(&self, event: &str, payload: Payload) -> Result<usize, GatewayError> {
        validate_event(event)?;
        let delivered = self.registry.broadcast(event, &payload).await;
        tracing::info!(event, delivered, "broadcast dispatched");
        Ok(delivered)
    }

    /// Sends `event`/`payload` to every ready connection except those keyed
    /// in `exclude`. Returns the number of accepted sends.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `event` is empty.
    pub async fn multicast(
        &self,
        exclude: &[ConnectionKey],
        event: &str,
        payload: Payload,
    ) -> Result<usize, GatewayError> {
        validate_event(event)?;
        let delivered = self.registry.multicast(exclude, event, &payload).await;
        tracing::info!(event, delivered, excluded = exclude.len(), "multicast dispatched");
        Ok(delivered)
    }

    /// Returns a snapshot of every registered connection.
    pub async fn list_connections(&self) -> Vec<ConnectionInfo> {
        let mut infos = Vec::new();
        self.registry
            .for_each(|handle| {
                infos.push(ConnectionInfo {
                    key: handle.key().clone(),
                    ready: handle.is_ready(),
                });
            })
            .await;
        infos
    }

    /// Returns the snapshot for one key, if registered.
    pub async fn get_connection(&self, key: &str) -> Option<ConnectionInfo> {
        self.registry.get(key).await.map(|handle| ConnectionInfo {
            key: handle.key().clone(),
            ready: handle.is_ready(),
        })
    }

    /// Disconnects and removes the connection registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionNotFound`] if the key is absent.
    /// The registry treats a missing key as a no-op, but the admin surface
    /// reports it.
    pub async fn disconnect(&self, key: &str) -> Result<(), GatewayError> {
        let Some(handle) = self.registry.get(key).await else {
            return Err(GatewayError::ConnectionNotFound(ConnectionKey::new(key)));
        };
        self.registry.disconnect(handle.as_ref()).await;
        tracing::info!(key, "connection disconnected");
        Ok(())
    }

    /// Disconnects every registered connection. Returns the count.
    pub async fn disconnect_all(&self) -> usize {
        let count = self.registry.disconnect_all().await;
        tracing::info!(count, "all connections disconnected");
        count
    }

    /// Consumes gateway events and fans them back out through the registry.
    ///
    /// Runs until the event bus is dropped. Inbound client messages are
    /// multicast to everyone except their origin; presence events go to
    /// everyone except the connection they describe. Both paths are gated
    /// by the [`RelayPolicy`].
    pub async fn run_relay(&self, mut rx: broadcast::Receiver<GatewayEvent>) {
        loop {
            match rx.recv().await {
                Ok(GatewayEvent::MessageReceived {
                    origin,
                    event,
                    payload,
                    ..
                }) => {
                    if self.policy.relay_messages {
                        let exclude = [origin];
                        self.registry.multicast(&exclude, &event, &payload).await;
                    }
                }
                Ok(GatewayEvent::ConnectionOpened { key, .. }) => {
                    if self.policy.presence_events {
                        let payload = Payload::Data(serde_json::json!({ "key": key }));
                        let exclude = [key];
                        self.registry
                            .multicast(&exclude, "connection.opened", &payload)
                            .await;
                    }
                }
                Ok(GatewayEvent::ConnectionClosed { key, .. }) => {
                    if self.policy.presence_events {
                        let payload = Payload::Data(serde_json::json!({ "key": key }));
                        self.registry.broadcast("connection.closed", &payload).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "relay loop lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Rejects empty event names before they reach dispatch.
fn validate_event(event: &str) -> Result<(), GatewayError> {
    if event.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "event name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::ConnectionHandle;

    #[derive(Debug)]
    struct RecordingConnection {
        key: ConnectionKey,
        ready: AtomicBool,
        events: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn new(key: &str) -> Arc<Self> {
            Arc::new(Self {
                key: ConnectionKey::new(key),
                ready: AtomicBool::new(true),
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    impl ConnectionHandle for RecordingConnection {
        fn key(&self) -> &ConnectionKey {
            &self.key
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn send(&self, event: &str, _payload: Payload) -> Result<(), GatewayError> {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.to_string());
            }
            Ok(())
        }

        fn disconnect(&self) {
            self.ready.store(false, Ordering::SeqCst);
        }
    }

    fn make_service(policy: RelayPolicy) -> (Arc<DispatchService>, EventBus) {
        let registry = Arc::new(ConnectionRegistry::new());
        let event_bus = EventBus::new(16);
        let service = Arc::new(DispatchService::new(registry, event_bus.clone(), policy));
        (service, event_bus)
    }

    async fn register(service: &DispatchService, conn: &Arc<RecordingConnection>) {
        service
            .registry()
            .register(Arc::clone(conn) as Arc<dyn ConnectionHandle>)
            .await;
    }

    /// Polls until `conn` has recorded at least one event or the deadline
    /// passes.
    async fn wait_for_event(conn: &RecordingConnection) -> bool {
        for _ in 0..100 {
            if !conn.events().is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn broadcast_rejects_empty_event_name() {
        let (service, _bus) = make_service(RelayPolicy::default());
        let result = service.broadcast("", Payload::text("m")).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn broadcast_reports_delivered_count() {
        let (service, _bus) = make_service(RelayPolicy::default());
        let a = RecordingConnection::new("a");
        let b = RecordingConnection::new("b");
        register(&service, &a).await;
        register(&service, &b).await;

        let delivered = service.broadcast("tick", Payload::text("m")).await;
        assert!(matches!(delivered, Ok(2)));
    }

    #[tokio::test]
    async fn disconnect_unknown_key_is_not_found() {
        let (service, _bus) = make_service(RelayPolicy::default());
        let result = service.disconnect("ghost").await;
        assert!(matches!(result, Err(GatewayError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn disconnect_known_key_removes_entry() {
        let (service, _bus) = make_service(RelayPolicy::default());
        let conn = RecordingConnection::new("alpha");
        register(&service, &conn).await;

        let result = service.disconnect("alpha").await;

        assert!(result.is_ok());
        assert!(!conn.is_ready());
        assert!(service.get_connection("alpha").await.is_none());
    }

    #[tokio::test]
    async fn list_connections_reports_readiness() {
        let (service, _bus) = make_service(RelayPolicy::default());
        let conn = RecordingConnection::new("alpha");
        register(&service, &conn).await;
        conn.ready.store(false, Ordering::SeqCst);

        let infos = service.list_connections().await;
        assert_eq!(infos.len(), 1);
        let Some(info) = infos.first() else {
            panic!("expected one connection");
        };
        assert_eq!(info.key, ConnectionKey::new("alpha"));
        assert!(!info.ready);
    }

    #[tokio::test]
    async fn relay_excludes_the_origin_connection() {
        let (service, bus) = make_service(RelayPolicy::default());
        let sender = RecordingConnection::new("sender");
        let peer = RecordingConnection::new("peer");
        register(&service, &sender).await;
        register(&service, &peer).await;

        let relay = Arc::clone(&service);
        let rx = bus.subscribe();
        tokio::spawn(async move { relay.run_relay(rx).await });

        bus.publish(GatewayEvent::MessageReceived {
            origin: ConnectionKey::new("sender"),
            event: "chat".to_string(),
            payload: Payload::text("hi"),
            timestamp: Utc::now(),
        });

        assert!(wait_for_event(&peer).await);
        assert_eq!(peer.events(), vec!["chat".to_string()]);
        assert!(sender.events().is_empty());
    }

    #[tokio::test]
    async fn relay_respects_disabled_policy() {
        let policy = RelayPolicy {
            relay_messages: false,
            presence_events: false,
        };
        let (service, bus) = make_service(policy);
        let peer = RecordingConnection::new("peer");
        register(&service, &peer).await;

        let relay = Arc::clone(&service);
        let rx = bus.subscribe();
        tokio::spawn(async move { relay.run_relay(rx).await });

        bus.publish(GatewayEvent::MessageReceived {
            origin: ConnectionKey::new("sender"),
            event: "chat".to_string(),
            payload: Payload::text("hi"),
            timestamp: Utc::now(),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(peer.events().is_empty());
    }

    #[tokio::test]
    async fn presence_events_skip_their_subject() {
        let (service, bus) = make_service(RelayPolicy::default());
        let joining = RecordingConnection::new("joining");
        let watcher = RecordingConnection::new("watcher");
        register(&service, &joining).await;
        register(&service, &watcher).await;

        let relay = Arc::clone(&service);
        let rx = bus.subscribe();
        tokio::spawn(async move { relay.run_relay(rx).await });

        bus.publish(GatewayEvent::ConnectionOpened {
            key: ConnectionKey::new("joining"),
            timestamp: Utc::now(),
        });

        assert!(wait_for_event(&watcher).await);
        assert_eq!(watcher.events(), vec!["connection.opened".to_string()]);
        assert!(joining.events().is_empty());
    }
}
