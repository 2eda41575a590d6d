//! Connection registry and fan-out dispatch.
//!
//! [`ConnectionRegistry`] owns the mapping from endpoint address to live
//! connection handle and implements the three dispatch primitives built on
//! it: broadcast, multicast with exclusion, and bulk disconnect. All policy
//! decisions — duplicate-key handling, readiness checks, exclusion
//! semantics, per-handle failure handling — live here and nowhere else.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::ConnectionKey;
use super::connection::{ConnectionHandle, Payload};

/// Central store for all open connections, keyed by endpoint address.
///
/// Uses a `RwLock<HashMap<...>>` like the rest of the domain layer. The
/// registry is created once at startup and shared via `Arc`; it has no
/// global instance.
///
/// # Concurrency
///
/// - Reads (`contains`, `get`, `for_each`, dispatch) take the read lock.
/// - Mutations (`register`, `unregister`, `disconnect`) take the write lock.
/// - The lock is never held while invoking `send` or `disconnect` on a
///   handle: dispatch operates on a snapshot taken under the lock, so a slow
///   or failing connection cannot stall registrations.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionKey, Arc<dyn ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a single connection under its key.
    ///
    /// A handle with an empty key is silently skipped — never inserted,
    /// never an error. Registering a key that already exists overwrites the
    /// previous entry (last write wins); callers are responsible for not
    /// double-registering a live connection whose old handle should stay
    /// reachable.
    pub async fn register(&self, handle: Arc<dyn ConnectionHandle>) {
        if handle.key().is_empty() {
            tracing::debug!("skipping registration of connection with empty key");
            return;
        }
        let mut map = self.connections.write().await;
        map.insert(handle.key().clone(), handle);
    }

    /// Registers every handle in the sequence, in order.
    ///
    /// Per-handle semantics are identical to [`register`](Self::register):
    /// empty keys are skipped, duplicate keys resolve to the last handle in
    /// the sequence.
    pub async fn register_many(&self, handles: Vec<Arc<dyn ConnectionHandle>>) {
        let mut map = self.connections.write().await;
        for handle in handles {
            if handle.key().is_empty() {
                tracing::debug!("skipping registration of connection with empty key");
                continue;
            }
            map.insert(handle.key().clone(), handle);
        }
    }

    /// Returns `true` iff a connection is registered under `handle.key()`.
    ///
    /// Compares key presence only, not handle identity.
    pub async fn contains(&self, handle: &dyn ConnectionHandle) -> bool {
        let map = self.connections.read().await;
        map.contains_key(handle.key().as_str())
    }

    /// Looks up a connection by key. Returns `None` when the key is absent.
    pub async fn get(&self, key: &str) -> Option<Arc<dyn ConnectionHandle>> {
        let map = self.connections.read().await;
        map.get(key).map(Arc::clone)
    }

    /// Invokes `f` once for every currently registered connection.
    ///
    /// Iterates over a snapshot taken at call time, so the callback may
    /// safely trigger registry mutations without skip/repeat effects on this
    /// traversal.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<dyn ConnectionHandle>),
    {
        for handle in self.snapshot().await {
            f(&handle);
        }
    }

    /// Removes the entry registered under `handle.key()`, if any.
    ///
    /// Only forgets the handle — it does NOT call `disconnect()` on it. A
    /// missing key is silently ignored, so repeated calls are safe.
    pub async fn unregister(&self, handle: &dyn ConnectionHandle) {
        let mut map = self.connections.write().await;
        map.remove(handle.key().as_str());
    }

    /// Removes every entry keyed by a handle in the sequence.
    ///
    /// Per-handle semantics are identical to
    /// [`unregister`](Self::unregister).
    pub async fn unregister_many(&self, handles: &[Arc<dyn ConnectionHandle>]) {
        let mut map = self.connections.write().await;
        for handle in handles {
            map.remove(handle.key().as_str());
        }
    }

    /// Sends `event`/`payload` to every registered connection that reports
    /// ready. Returns the number of accepted sends.
    ///
    /// Not-ready connections are skipped without error: no queuing, no
    /// retry, at-most-once best-effort delivery to currently-ready
    /// connections only. A send failure on one connection is logged and
    /// never blocks dispatch to the rest.
    pub async fn broadcast(&self, event: &str, payload: &Payload) -> usize {
        let targets = self.snapshot().await;
        dispatch(&targets, event, payload)
    }

    /// Sends `event`/`payload` to every ready connection whose key is NOT in
    /// `exclude`. Returns the number of accepted sends.
    ///
    /// Exclusion is evaluated **by key**: callers holding handles pass
    /// `handle.key().clone()`. An empty exclusion set makes this identical
    /// to [`broadcast`](Self::broadcast). The exclusion set is applied to a
    /// snapshot only — excluded connections stay registered.
    pub async fn multicast(
        &self,
        exclude: &[ConnectionKey],
        event: &str,
        payload: &Payload,
    ) -> usize {
        let targets: Vec<_> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|handle| !exclude.contains(handle.key()))
            .collect();
        dispatch(&targets, event, payload)
    }

    /// Disconnects and removes the connection registered under
    /// `handle.key()`.
    ///
    /// `disconnect()` is invoked on the *currently registered* handle for
    /// that key, which is not necessarily `handle` itself if the key was
    /// re-registered. Returns `true` if an entry was removed, `false` if the
    /// key was absent (a no-op).
    pub async fn disconnect(&self, handle: &dyn ConnectionHandle) -> bool {
        let removed = {
            let mut map = self.connections.write().await;
            map.remove(handle.key().as_str())
        };
        match removed {
            Some(registered) => {
                registered.disconnect();
                true
            }
            None => false,
        }
    }

    /// Disconnects every registered connection and clears the registry.
    /// Returns the number of connections disconnected.
    ///
    /// Removal here is deliberate: `disconnect` removes the entry for one
    /// key, and bulk disconnect behaves the same way for all of them, so the
    /// registry never retains handles it has already torn down.
    pub async fn disconnect_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut map = self.connections.write().await;
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &drained {
            handle.disconnect();
        }
        drained.len()
    }

    /// Returns the keys of all registered connections.
    pub async fn keys(&self) -> Vec<ConnectionKey> {
        let map = self.connections.read().await;
        map.keys().cloned().collect()
    }

    /// Returns the number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connections are registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Clones the current handle set out from under the read lock.
    async fn snapshot(&self) -> Vec<Arc<dyn ConnectionHandle>> {
        let map = self.connections.read().await;
        map.values().map(Arc::clone).collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivers `event`/`payload` to every ready handle in `targets`.
///
/// One failure policy, applied uniformly across broadcast, multicast, and
/// any future dispatch path: per-handle errors are logged at `warn` and
/// dispatch continues, so one failing connection cannot abort delivery to
/// the rest. Handles are never evicted here.
fn dispatch(targets: &[Arc<dyn ConnectionHandle>], event: &str, payload: &Payload) -> usize {
    let mut delivered = 0;
    for handle in targets {
        if !handle.is_ready() {
            continue;
        }
        match handle.send(event, payload.clone()) {
            Ok(()) => delivered += 1,
            Err(err) => {
                tracing::warn!(key = %handle.key(), %err, "send failed, continuing dispatch");
            }
        }
    }
    delivered
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::error::GatewayError;

    /// Scripted connection double recording every call the registry makes.
    #[derive(Debug)]
    struct FakeConnection {
        key: ConnectionKey,
        ready: AtomicBool,
        fail_sends: bool,
        sent: Mutex<Vec<(String, Payload)>>,
        disconnects: AtomicUsize,
    }

    impl FakeConnection {
        fn ready(key: &str) -> Arc<Self> {
            Self::build(key, true, false)
        }

        fn not_ready(key: &str) -> Arc<Self> {
            Self::build(key, false, false)
        }

        fn failing(key: &str) -> Arc<Self> {
            Self::build(key, true, true)
        }

        fn build(key: &str, ready: bool, fail_sends: bool) -> Arc<Self> {
            Arc::new(Self {
                key: ConnectionKey::new(key),
                ready: AtomicBool::new(ready),
                fail_sends,
                sent: Mutex::new(Vec::new()),
                disconnects: AtomicUsize::new(0),
            })
        }

        fn sent(&self) -> Vec<(String, Payload)> {
            self.sent.lock().map(|log| log.clone()).unwrap_or_default()
        }

        fn disconnect_count(&self) -> usize {
            self.disconnects.load(Ordering::SeqCst)
        }
    }

    impl ConnectionHandle for FakeConnection {
        fn key(&self) -> &ConnectionKey {
            &self.key
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn send(&self, event: &str, payload: Payload) -> Result<(), GatewayError> {
            if self.fail_sends {
                return Err(GatewayError::ConnectionClosed(self.key.clone()));
            }
            if let Ok(mut log) = self.sent.lock() {
                log.push((event.to_string(), payload));
            }
            Ok(())
        }

        fn disconnect(&self) {
            self.ready.store(false, Ordering::SeqCst);
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn as_handle(fake: &Arc<FakeConnection>) -> Arc<dyn ConnectionHandle> {
        Arc::clone(fake) as Arc<dyn ConnectionHandle>
    }

    #[tokio::test]
    async fn register_and_get() {
        let registry = ConnectionRegistry::new();
        let conn = FakeConnection::ready("alpha");

        registry.register(as_handle(&conn)).await;

        assert!(registry.contains(conn.as_ref()).await);
        assert!(registry.get("alpha").await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn get_absent_key_returns_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_key_last_write_wins() {
        let registry = ConnectionRegistry::new();
        let first = FakeConnection::ready("shared");
        let second = FakeConnection::not_ready("shared");

        registry
            .register_many(vec![as_handle(&first), as_handle(&second)])
            .await;

        assert_eq!(registry.len().await, 1);
        let Some(registered) = registry.get("shared").await else {
            panic!("key should be registered");
        };
        // The second handle (not ready) must have replaced the first.
        assert!(!registered.is_ready());
    }

    #[tokio::test]
    async fn empty_key_is_never_inserted() {
        let registry = ConnectionRegistry::new();
        let unnamed = FakeConnection::ready("");

        registry.register(as_handle(&unnamed)).await;

        assert!(registry.is_empty().await);
        assert!(!registry.contains(unnamed.as_ref()).await);
    }

    #[tokio::test]
    async fn register_unregister_round_trip() {
        let registry = ConnectionRegistry::new();
        let conn = FakeConnection::ready("alpha");

        registry.register(as_handle(&conn)).await;
        assert!(registry.contains(conn.as_ref()).await);

        registry.unregister(conn.as_ref()).await;
        assert!(!registry.contains(conn.as_ref()).await);
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_does_not_disconnect() {
        let registry = ConnectionRegistry::new();
        let conn = FakeConnection::ready("alpha");

        registry.register(as_handle(&conn)).await;
        registry.unregister(conn.as_ref()).await;
        registry.unregister(conn.as_ref()).await;

        assert!(registry.is_empty().await);
        assert_eq!(conn.disconnect_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_ready_connections() {
        let registry = ConnectionRegistry::new();
        let up = FakeConnection::ready("up");
        let down = FakeConnection::not_ready("down");
        registry
            .register_many(vec![as_handle(&up), as_handle(&down)])
            .await;

        let delivered = registry.broadcast("tick", &Payload::text("m")).await;

        assert_eq!(delivered, 1);
        assert_eq!(up.sent(), vec![("tick".to_string(), Payload::text("m"))]);
        assert!(down.sent().is_empty());
    }

    #[tokio::test]
    async fn one_failing_send_does_not_block_the_rest() {
        let registry = ConnectionRegistry::new();
        let broken = FakeConnection::failing("broken");
        let healthy = FakeConnection::ready("healthy");
        registry
            .register_many(vec![as_handle(&broken), as_handle(&healthy)])
            .await;

        let delivered = registry.broadcast("tick", &Payload::text("m")).await;

        assert_eq!(delivered, 1);
        assert_eq!(healthy.sent().len(), 1);
        // The failing connection is not evicted.
        assert!(registry.contains(broken.as_ref()).await);
    }

    #[tokio::test]
    async fn multicast_excludes_by_key_without_removing() {
        let registry = ConnectionRegistry::new();
        let a = FakeConnection::ready("a");
        let b = FakeConnection::ready("b");
        let c = FakeConnection::ready("c");
        registry
            .register_many(vec![as_handle(&a), as_handle(&b), as_handle(&c)])
            .await;

        let delivered = registry
            .multicast(&[ConnectionKey::new("b")], "tick", &Payload::text("m"))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(a.sent().len(), 1);
        assert!(b.sent().is_empty());
        assert_eq!(c.sent().len(), 1);
        // Exclusion must not touch the live registry.
        assert!(registry.contains(b.as_ref()).await);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn multicast_with_empty_exclusion_is_broadcast() {
        let registry = ConnectionRegistry::new();
        let a = FakeConnection::ready("a");
        let b = FakeConnection::ready("b");
        registry
            .register_many(vec![as_handle(&a), as_handle(&b)])
            .await;

        let delivered = registry.multicast(&[], "tick", &Payload::text("m")).await;

        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn disconnect_targets_registered_handle_and_removes_entry() {
        let registry = ConnectionRegistry::new();
        let stale = FakeConnection::ready("shared");
        let replacement = FakeConnection::ready("shared");
        registry.register(as_handle(&stale)).await;
        registry.register(as_handle(&replacement)).await;

        // Disconnecting via the stale handle must tear down the handle
        // currently registered under the key, not the argument.
        let removed = registry.disconnect(stale.as_ref()).await;

        assert!(removed);
        assert_eq!(stale.disconnect_count(), 0);
        assert_eq!(replacement.disconnect_count(), 1);
        assert!(registry.get("shared").await.is_none());
    }

    #[tokio::test]
    async fn disconnect_absent_key_is_noop() {
        let registry = ConnectionRegistry::new();
        let conn = FakeConnection::ready("ghost");

        assert!(!registry.disconnect(conn.as_ref()).await);
        assert_eq!(conn.disconnect_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_all_disconnects_and_clears() {
        let registry = ConnectionRegistry::new();
        let a = FakeConnection::ready("a");
        let b = FakeConnection::not_ready("b");
        registry
            .register_many(vec![as_handle(&a), as_handle(&b)])
            .await;

        let count = registry.disconnect_all().await;

        assert_eq!(count, 2);
        assert_eq!(a.disconnect_count(), 1);
        assert_eq!(b.disconnect_count(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn for_each_visits_every_connection() {
        let registry = ConnectionRegistry::new();
        registry
            .register_many(vec![
                as_handle(&FakeConnection::ready("a")),
                as_handle(&FakeConnection::not_ready("b")),
            ])
            .await;

        let mut visited = Vec::new();
        registry
            .for_each(|handle| visited.push(handle.key().clone()))
            .await;

        visited.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(
            visited,
            vec![ConnectionKey::new("a"), ConnectionKey::new("b")]
        );
    }

    #[tokio::test]
    async fn unregister_many_removes_all_given() {
        let registry = ConnectionRegistry::new();
        let a = FakeConnection::ready("a");
        let b = FakeConnection::ready("b");
        let c = FakeConnection::ready("c");
        registry
            .register_many(vec![as_handle(&a), as_handle(&b), as_handle(&c)])
            .await;

        registry
            .unregister_many(&[as_handle(&a), as_handle(&c)])
            .await;

        assert_eq!(registry.keys().await, vec![ConnectionKey::new("b")]);
    }
}
