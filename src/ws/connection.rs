//! WebSocket connection handle and per-socket loop.
//!
//! [`WsConnection`] is the concrete [`ConnectionHandle`] the gateway
//! registers: sends enqueue frames onto an unbounded channel that the
//! socket task drains, so dispatch never blocks on socket I/O.
//! [`run_connection`] owns the read/write loop for one socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};

use super::messages::{ClientMessage, Frame};
use crate::app_state::AppState;
use crate::domain::{ConnectionHandle, ConnectionKey, EventBus, GatewayEvent, Payload};
use crate::error::GatewayError;

/// Handle for one live WebSocket connection.
///
/// Ready from creation until [`disconnect`](ConnectionHandle::disconnect)
/// is called or the socket task drops its end of the outbound channel.
#[derive(Debug)]
pub struct WsConnection {
    key: ConnectionKey,
    outbound: mpsc::UnboundedSender<Frame>,
    ready: AtomicBool,
    close: Notify,
}

impl WsConnection {
    /// Creates a handle whose sends feed the given outbound channel.
    #[must_use]
    pub fn new(key: ConnectionKey, outbound: mpsc::UnboundedSender<Frame>) -> Self {
        Self {
            key,
            outbound,
            ready: AtomicBool::new(true),
            close: Notify::new(),
        }
    }

    /// Resolves once [`disconnect`](ConnectionHandle::disconnect) has been
    /// called. The socket loop selects on this to initiate teardown.
    pub async fn closed(&self) {
        self.close.notified().await;
    }
}

impl ConnectionHandle for WsConnection {
    fn key(&self) -> &ConnectionKey {
        &self.key
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn send(&self, event: &str, payload: Payload) -> Result<(), GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::ConnectionClosed(self.key.clone()));
        }
        self.outbound
            .send(Frame::new(event, payload))
            .map_err(|_| GatewayError::ConnectionClosed(self.key.clone()))
    }

    fn disconnect(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.close.notify_one();
    }
}

/// Runs the read/write loop for a single WebSocket connection.
///
/// Registers the connection on entry and forgets it on exit, publishing
/// `ConnectionOpened`/`ConnectionClosed` around the loop. The loop forwards
/// queued outbound frames to the socket, parses inbound client messages
/// onto the event bus, and honors the handle's disconnect signal.
pub async fn run_connection(socket: WebSocket, key: ConnectionKey, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    let conn = Arc::new(WsConnection::new(key.clone(), outbound_tx));
    let handle: Arc<dyn ConnectionHandle> = Arc::clone(&conn) as Arc<dyn ConnectionHandle>;

    state.registry.register(Arc::clone(&handle)).await;
    let _ = state.event_bus.publish(GatewayEvent::ConnectionOpened {
        key: key.clone(),
        timestamp: Utc::now(),
    });
    tracing::info!(key = %key, "ws connection registered");

    loop {
        tokio::select! {
            // Frame queued by a registry dispatch
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let json = serde_json::to_string(&frame).unwrap_or_default();
                if ws_tx.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
            // Incoming message from the client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text_message(&text, &key, &state.event_bus)
                            && ws_tx.send(Message::text(reply)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            // Teardown requested through the handle
            () = conn.closed() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    conn.disconnect();
    // A newer connection may have replaced this entry under the same key;
    // only forget the entry if it is still ours.
    let still_ours = state
        .registry
        .get(key.as_str())
        .await
        .is_some_and(|current| Arc::ptr_eq(&current, &handle));
    if still_ours {
        state.registry.unregister(conn.as_ref()).await;
    }
    let _ = state.event_bus.publish(GatewayEvent::ConnectionClosed {
        key: key.clone(),
        timestamp: Utc::now(),
    });
    tracing::debug!(key = %key, "ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON reply.
///
/// Well-formed messages are published onto the event bus for the relay loop;
/// malformed JSON gets an error frame back.
fn handle_text_message(text: &str, key: &ConnectionKey, event_bus: &EventBus) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        let err = Frame::error("malformed message, expected {\"event\", \"payload\"}");
        return serde_json::to_string(&err).ok();
    };

    let _ = event_bus.publish(GatewayEvent::MessageReceived {
        origin: key.clone(),
        event: msg.event,
        payload: msg.payload,
        timestamp: Utc::now(),
    });
    None
}
