//! Minimal Socket.IO v5 server over a raw Engine.IO v4 WebSocket.
//!
//! Only what the admin streams use: the open packet, namespace connect on
//! `/`, server pings, `<stream>:subscribe` room joins, and server-to-client
//! events. Every accepted connection receives `dashboard:stats:init`.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::rest::dashboard_stats;
use crate::AppState;

pub const PING_INTERVAL_MS: u64 = 25_000;
pub const PING_TIMEOUT_MS: u64 = 20_000;

enum Outbound {
    Frame(String),
    /// Close the socket without a Socket.IO disconnect, like a lost network.
    Drop,
}

struct Peer {
    joined: bool,
    rooms: BTreeSet<String>,
    tx: mpsc::UnboundedSender<Outbound>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    peers: HashMap<u64, Peer>,
    subscriptions: Vec<(String, Vec<String>)>,
    handshakes: u64,
    cookies: Vec<Option<String>>,
    refuse: Option<String>,
}

/// Registry of live sockets, shared between the endpoint and tests.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
}

impl Hub {
    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, cookie: Option<String>) -> (u64, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.handshakes += 1;
        inner.cookies.push(cookie);
        inner.peers.insert(
            id,
            Peer {
                joined: false,
                rooms: BTreeSet::new(),
                tx,
            },
        );
        (id, rx)
    }

    fn unregister(&self, id: u64) {
        self.lock().peers.remove(&id);
    }

    fn join_namespace(&self, id: u64) {
        if let Some(peer) = self.lock().peers.get_mut(&id) {
            peer.joined = true;
        }
    }

    fn subscribe(&self, id: u64, event: &str, rooms: Vec<String>) {
        let mut inner = self.lock();
        if let Some(peer) = inner.peers.get_mut(&id) {
            peer.rooms.extend(rooms.iter().cloned());
        }
        inner.subscriptions.push((event.to_string(), rooms));
    }

    /// Send `event` to every joined socket in `room`, or to all joined
    /// sockets when `room` is `None`. Returns the number of recipients.
    pub fn emit(&self, room: Option<&str>, event: &str, payload: Value) -> usize {
        self.broadcast(room, format!("42{}", json!([event, payload])))
    }

    /// Like `emit`, but on `namespace` (e.g. `/audit`), which clients
    /// connected to `/` never joined.
    pub fn emit_in_namespace(&self, namespace: &str, room: Option<&str>, event: &str, payload: Value) -> usize {
        self.broadcast(room, format!("42{namespace},{}", json!([event, payload])))
    }

    fn broadcast(&self, room: Option<&str>, frame: String) -> usize {
        let inner = self.lock();
        let mut sent = 0;
        for peer in inner.peers.values() {
            if !peer.joined || room.is_some_and(|r| !peer.rooms.contains(r)) {
                continue;
            }
            if peer.tx.send(Outbound::Frame(frame.clone())).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Cut every connection at the WebSocket level. Clients see a transport
    /// close and are expected to reconnect.
    pub fn drop_connections(&self) {
        for peer in self.lock().peers.values() {
            let _ = peer.tx.send(Outbound::Drop);
        }
    }

    /// Refuse namespace connects with `44{"message": ..}`; `None` accepts again.
    pub fn refuse_connections(&self, message: Option<&str>) {
        self.lock().refuse = message.map(str::to_string);
    }

    /// Sockets that completed the namespace connect.
    pub fn connected(&self) -> usize {
        self.lock().peers.values().filter(|peer| peer.joined).count()
    }

    /// Rooms of every connected socket, sorted per socket.
    pub fn connected_rooms(&self) -> Vec<Vec<String>> {
        self.lock()
            .peers
            .values()
            .filter(|peer| peer.joined)
            .map(|peer| peer.rooms.iter().cloned().collect())
            .collect()
    }

    /// Every subscribe event received so far, in order.
    pub fn subscriptions(&self) -> Vec<(String, Vec<String>)> {
        self.lock().subscriptions.clone()
    }

    /// WebSocket handshakes accepted so far.
    pub fn handshakes(&self) -> u64 {
        self.lock().handshakes
    }

    /// `cookie` header of each handshake, in order.
    pub fn handshake_cookies(&self) -> Vec<Option<String>> {
        self.lock().cookies.clone()
    }

    fn refusal(&self) -> Option<String> {
        self.lock().refuse.clone()
    }
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if params.get("EIO").map(String::as_str) != Some("4") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 5, "message": "Unsupported protocol version"})),
        )
            .into_response();
    }
    if params.get("transport").map(String::as_str) != Some("websocket") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 0, "message": "Transport unknown"})),
        )
            .into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| serve(socket, state, cookie))
}

async fn serve(mut socket: WebSocket, state: AppState, cookie: Option<String>) {
    let sid = Uuid::new_v4().simple().to_string();
    let open = json!({
        "sid": sid,
        "upgrades": [],
        "pingInterval": PING_INTERVAL_MS,
        "pingTimeout": PING_TIMEOUT_MS,
        "maxPayload": 1_000_000,
    });
    if socket.send(Message::Text(format!("0{open}").into())).await.is_err() {
        return;
    }

    let hub = state.hub.clone();
    let (id, mut outbound) = hub.register(cookie);
    tracing::info!(%sid, "socket opened");

    let mut ping = tokio::time::interval(Duration::from_millis(PING_INTERVAL_MS));
    ping.tick().await;

    loop {
        let replies = tokio::select! {
            _ = ping.tick() => vec!["2".to_string()],
            out = outbound.recv() => match out {
                Some(Outbound::Frame(frame)) => vec![frame],
                Some(Outbound::Drop) | None => break,
            },
            frame = socket.recv() => match frame {
                Some(Ok(Message::Text(text))) => match on_text(&state, id, &sid, text.as_str()).await {
                    Some(replies) => replies,
                    None => break,
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => Vec::new(),
            },
        };
        for reply in replies {
            if socket.send(Message::Text(reply.into())).await.is_err() {
                hub.unregister(id);
                return;
            }
        }
    }

    hub.unregister(id);
    tracing::info!(%sid, "socket closed");
}

/// Frames to send back, or `None` to end the session.
async fn on_text(state: &AppState, id: u64, sid: &str, text: &str) -> Option<Vec<String>> {
    let hub = &state.hub;
    let mut chars = text.chars();
    match chars.next() {
        Some('1') => None,
        Some('2') => Some(vec!["3".to_string()]),
        Some('4') => {
            let mut packet = chars.as_str().chars();
            match packet.next() {
                Some('0') => {
                    if let Some(message) = hub.refusal() {
                        return Some(vec![format!("44{}", json!({ "message": message }))]);
                    }
                    hub.join_namespace(id);
                    let stats = dashboard_stats(&*state.db.read().await);
                    Some(vec![
                        format!("40{}", json!({ "sid": sid })),
                        format!("42{}", json!(["dashboard:stats:init", stats])),
                    ])
                }
                Some('1') => None,
                Some('2') => {
                    on_event(hub, id, packet.as_str());
                    Some(Vec::new())
                }
                _ => Some(Vec::new()),
            }
        }
        _ => Some(Vec::new()),
    }
}

fn on_event(hub: &Hub, id: u64, body: &str) {
    let json_start = body.find('[').unwrap_or(body.len());
    let Ok(Value::Array(args)) = serde_json::from_str::<Value>(&body[json_start..]) else {
        return;
    };
    let Some(event) = args.first().and_then(Value::as_str) else {
        return;
    };
    if !event.ends_with(":subscribe") {
        return;
    }
    let rooms = args
        .get(1)
        .and_then(|payload| payload.get("rooms"))
        .and_then(Value::as_array)
        .map(|rooms| {
            rooms
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    tracing::debug!(event, ?rooms, "socket subscribed");
    hub.subscribe(id, event, rooms);
}
