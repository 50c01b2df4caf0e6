//! Connection handlers for Parley server.
//!
//! This module handles the connection lifecycle and event processing.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parley_core::{ConnectionId, Hub, Router as EventRouter, RouterConfig};
use parley_protocol::{codec, EventKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The event router and its room registry.
    pub router: EventRouter,
    /// Outbound queues of open connections.
    pub hub: Hub,
    /// Server configuration.
    pub config: Config,
    /// Connection slots taken, counted from before the upgrade.
    slots: AtomicUsize,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let router_config = RouterConfig {
            max_rooms: config.limits.max_rooms,
        };

        Self {
            router: EventRouter::with_config(router_config),
            hub: Hub::new(),
            config,
            slots: AtomicUsize::new(0),
        }
    }

    /// Claim a connection slot if the limit allows one.
    fn try_reserve(self: &Arc<Self>) -> Option<ConnectionSlot> {
        let limit = self.config.limits.max_connections;
        self.slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < limit).then_some(taken + 1)
            })
            .ok()
            .map(|_| ConnectionSlot {
                state: Arc::clone(self),
            })
    }
}

/// A claimed connection slot, released on drop.
struct ConnectionSlot {
    state: Arc<AppState>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.slots.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Build the HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    let ws_path = state.config.transport.websocket_path.clone();

    Router::new()
        .route(&ws_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = app(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Parley server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.router.registry().stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "connections": state.hub.len(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let Some(slot) = state.try_reserve() else {
        warn!(
            limit = state.config.limits.max_connections,
            "Connection limit reached, refusing upgrade"
        );
        metrics::record_error("capacity");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.on_upgrade(move |socket| handle_websocket(socket, state, slot))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, _slot: ConnectionSlot) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    info!(connection = %connection_id, "User connected");

    let mut outbound = state.hub.register(connection_id.clone());
    let (mut sender, mut receiver) = socket.split();

    let interval = Duration::from_millis(state.config.heartbeat.interval_ms);
    let timeout = Duration::from_millis(state.config.heartbeat.timeout_ms);
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            biased;

            // Events routed to this connection
            Some(frame) = outbound.recv() => {
                if sender.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        last_seen = Instant::now();
                        match msg {
                            Message::Text(text) => handle_text(&text, &connection_id, &state),
                            Message::Binary(data) => {
                                warn!(connection = %connection_id, bytes = data.len(), "Dropping binary frame");
                                metrics::record_dropped("binary");
                            }
                            Message::Ping(data) => {
                                if sender.send(Message::Pong(data)).await.is_err() {
                                    break;
                                }
                            }
                            Message::Pong(_) => {}
                            Message::Close(_) => {
                                debug!(connection = %connection_id, "Received close frame");
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if last_seen.elapsed() > timeout {
                    info!(connection = %connection_id, "Heartbeat timed out");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup: stop queueing, then tell the room
    state.hub.unregister(&connection_id);
    let notified = state.router.handle_disconnect(&connection_id, &state.hub);
    metrics::record_deliveries(notified);
    metrics::set_active_rooms(state.router.registry().stats().room_count);

    info!(connection = %connection_id, notified = notified, "User disconnected");
}

/// Decode, route and deliver one inbound text frame.
///
/// Nothing here closes the connection: bad events are logged and dropped.
fn handle_text(text: &str, connection_id: &ConnectionId, state: &AppState) {
    let start = Instant::now();

    if text.len() > state.config.limits.max_message_size {
        warn!(
            connection = %connection_id,
            bytes = text.len(),
            limit = state.config.limits.max_message_size,
            "Dropping oversized event"
        );
        metrics::record_dropped("too_large");
        return;
    }

    let event = match codec::decode(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(connection = %connection_id, error = %e, "Dropping malformed event");
            metrics::record_dropped(e.reason());
            return;
        }
    };

    let kind = event.kind();
    metrics::record_inbound(kind.as_str(), text.len());

    match state.router.handle(connection_id, event, &state.hub) {
        Ok(delivered) => {
            metrics::record_deliveries(delivered);
            debug!(connection = %connection_id, event = %kind, recipients = delivered, "Routed");
        }
        Err(e) => {
            warn!(connection = %connection_id, event = %kind, error = %e, "Dropping event");
            metrics::record_dropped(e.reason());
        }
    }

    if matches!(kind, EventKind::JoinRoom | EventKind::RejoinCall) {
        metrics::set_active_rooms(state.router.registry().stats().room_count);
    }

    metrics::record_latency(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tokio_tungstenite::{
        connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
    };

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn spawn_server(config: Config) -> (SocketAddr, Arc<AppState>) {
        let state = Arc::new(AppState::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = app(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        client
    }

    async fn emit(client: &mut Client, event: Value) {
        client
            .send(WsMessage::Text(event.to_string()))
            .await
            .unwrap();
    }

    async fn next_event(client: &mut Client) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for event")
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn wait_for_room_size(state: &AppState, room: &str, size: usize) {
        for _ in 0..200 {
            if state.router.registry().room_size(room) == size {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room {} never reached size {}", room, size);
    }

    #[tokio::test]
    async fn test_call_setup_over_websocket() {
        let (addr, state) = spawn_server(Config::default()).await;

        let mut alice = connect(addr).await;
        emit(
            &mut alice,
            json!({"event": "join-room", "data": {"roomID": "r1", "userName": "Alice"}}),
        )
        .await;
        wait_for_room_size(&state, "r1", 1).await;

        let mut bob = connect(addr).await;
        emit(
            &mut bob,
            json!({"event": "join-room", "data": {"roomID": "r1", "userName": "Bob"}}),
        )
        .await;

        let joined = next_event(&mut alice).await;
        assert_eq!(joined["event"], "user-joined");
        assert_eq!(joined["data"]["userName"], "Bob");
        let bob_id = joined["data"]["id"].as_str().unwrap().to_string();

        assert_eq!(next_event(&mut bob).await, json!({"event": "existing-user"}));

        // Garbage is dropped without closing the connection
        alice
            .send(WsMessage::Text("not json".to_string()))
            .await
            .unwrap();

        emit(
            &mut alice,
            json!({"event": "call-request", "data": {"roomID": "r1"}}),
        )
        .await;
        let request = next_event(&mut bob).await;
        assert_eq!(request["event"], "call-request");
        let alice_id = request["data"]["callerId"].as_str().unwrap().to_string();
        assert_ne!(alice_id, bob_id);

        emit(
            &mut alice,
            json!({"event": "offer", "data": {"roomID": "r1", "offer": {"type": "offer", "sdp": "X"}}}),
        )
        .await;
        let offer = next_event(&mut bob).await;
        assert_eq!(offer["event"], "offer");
        assert_eq!(offer["data"]["offer"], json!({"type": "offer", "sdp": "X"}));
        assert_eq!(offer["data"]["sender"], alice_id.as_str());

        emit(
            &mut bob,
            json!({"event": "send-message", "data": {"roomID": "r1", "message": {"sender": "Bob", "text": "hi"}}}),
        )
        .await;
        let expected = json!({"event": "receive-message", "data": {"sender": "Bob", "text": "hi"}});
        assert_eq!(next_event(&mut bob).await, expected);
        assert_eq!(next_event(&mut alice).await, expected);

        bob.close(None).await.unwrap();
        assert_eq!(
            next_event(&mut alice).await,
            json!({"event": "user-disconnected", "data": {"id": bob_id}})
        );
        wait_for_room_size(&state, "r1", 1).await;

        drop(alice);
        wait_for_room_size(&state, "r1", 0).await;
        assert!(!state.router.registry().contains_room("r1"));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let mut config = Config::default();
        config.limits.max_connections = 0;
        let (addr, _state) = spawn_server(config).await;

        assert!(connect_async(format!("ws://{}/ws", addr)).await.is_err());
    }

    #[test]
    fn test_connection_slots() {
        let mut config = Config::default();
        config.limits.max_connections = 1;
        let state = Arc::new(AppState::new(config));

        let slot = state.try_reserve().unwrap();
        assert!(state.try_reserve().is_none());

        drop(slot);
        assert!(state.try_reserve().is_some());
        assert_eq!(state.slots.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn test_health_reports_rooms() {
        let state = Arc::new(AppState::new(Config::default()));
        state
            .router
            .registry()
            .join("lobby", &ConnectionId::new("c1"))
            .unwrap();

        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rooms"], 1);
        assert_eq!(body["connections"], 0);
    }
}
