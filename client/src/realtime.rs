//! Socket.IO driver for `StreamSession`.
//!
//! # Design
//! Each stream runs on its own thread with a current-thread tokio runtime.
//! The driver task opens the WebSocket, performs the Engine.IO/Socket.IO
//! handshake, feeds frames to the session and sends whatever the session
//! returns (the room subscription, on every connect). Lost connections are
//! retried on the `ReconnectPolicy` schedule.
//!
//! The caller owns the `ConnectionHandle`. Dropping it or calling
//! `disconnect` flips the shared closed flag, which silences every callback
//! at once, and asks the task to say goodbye to the server.
//!
//! Handshake:
//!
//! ```text
//! server: 0{"sid":..,"pingInterval":25000,"pingTimeout":20000}
//! client: 40
//! server: 40{"sid":..}            (or 44{"message":..} to refuse)
//! client: 42["bi:subscribe",{"rooms":[..]}]
//! server: 2 (ping) / client: 3 (pong), 42[event, payload] ...
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use admin_core::{
    EnginePacket, OpenHandshake, SocketPacket, StreamError, StreamSession, SubscriptionIntent,
    TransportEvent,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::ReconnectPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO's default connect timeout.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
enum DriverCmd {
    Emit(SocketPacket),
    Shutdown,
}

/// Everything the driver thread needs to open a stream.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub url: Url,
    pub cookie: Option<String>,
    pub reconnect: ReconnectPolicy,
}

/// Shared control block of one running stream.
#[derive(Debug)]
pub(crate) struct StreamControl {
    name: String,
    closed: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    commands: mpsc::Sender<DriverCmd>,
}

impl StreamControl {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Idempotent. Dispatch stops as soon as the flag is set.
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        // A full queue is fine: the task also polls the closed flag.
        let _ = self.commands.try_send(DriverCmd::Shutdown);
        tracing::info!(stream = %self.name, "stream disconnect requested");
    }
}

/// Caller-owned handle to a live stream.
#[derive(Debug)]
#[must_use = "dropping the handle disconnects the stream"]
pub struct ConnectionHandle {
    control: Arc<StreamControl>,
}

impl ConnectionHandle {
    pub fn name(&self) -> &str {
        &self.control.name
    }

    pub fn is_connected(&self) -> bool {
        !self.control.is_closed() && self.control.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    /// Emit an event on the live socket. Emits while disconnected are
    /// dropped, as Socket.IO does without buffering.
    pub fn emit(&self, event: &str, payload: Value) -> Result<(), StreamError> {
        if self.is_closed() {
            return Err(StreamError::Transport("stream is closed".to_string()));
        }
        self.control
            .commands
            .try_send(DriverCmd::Emit(SocketPacket::event(event, payload)))
            .map_err(|e| StreamError::Transport(e.to_string()))
    }

    /// Tear the stream down. No callback fires after this returns.
    pub fn disconnect(&self) {
        self.control.shutdown();
    }

    pub(crate) fn control(&self) -> Arc<StreamControl> {
        Arc::clone(&self.control)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.control.shutdown();
    }
}

/// The one active stream of an `AdminApi`.
#[derive(Debug, Default)]
pub struct StreamSlot {
    current: Mutex<Option<Arc<StreamControl>>>,
}

impl StreamSlot {
    /// Tear down the current stream, then start a new one, under one lock so
    /// two racing callers cannot both end up live.
    pub fn replace(
        &self,
        start: impl FnOnce() -> Result<ConnectionHandle, StreamError>,
    ) -> Result<ConnectionHandle, StreamError> {
        let mut current = self.lock();
        if let Some(previous) = current.take() {
            tracing::info!(stream = %previous.name, "superseding active stream");
            previous.shutdown();
        }
        let handle = start()?;
        *current = Some(handle.control());
        Ok(handle)
    }

    /// Tear down the current stream. Returns whether one was live.
    pub fn clear(&self) -> bool {
        match self.lock().take() {
            Some(previous) => {
                let was_live = !previous.is_closed();
                previous.shutdown();
                was_live
            }
            None => false,
        }
    }

    /// Name of the live stream, if any.
    pub fn active(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .filter(|control| !control.is_closed())
            .map(|control| control.name.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<StreamControl>>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Start a driver thread for `intent`.
pub fn spawn_stream(
    target: StreamTarget,
    intent: SubscriptionIntent,
) -> Result<ConnectionHandle, StreamError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| StreamError::Transport(format!("runtime: {e}")))?;

    let name = intent.name().to_string();
    let closed = Arc::new(AtomicBool::new(false));
    let connected = Arc::new(AtomicBool::new(false));
    let (commands, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let task = ConnectionTask {
        session: StreamSession::with_closed_flag(intent, Arc::clone(&closed)),
        connected: Arc::clone(&connected),
        cmd_rx,
        target,
    };

    std::thread::Builder::new()
        .name(format!("admin-stream-{name}"))
        .spawn(move || runtime.block_on(task.run()))
        .map_err(|e| StreamError::Transport(format!("spawn: {e}")))?;

    tracing::info!(stream = %name, "stream started");
    Ok(ConnectionHandle {
        control: Arc::new(StreamControl {
            name,
            closed,
            connected,
            commands,
        }),
    })
}

/// Why the pump stopped.
enum Exit {
    Shutdown,
    /// The server ended the Socket.IO session; Socket.IO does not retry.
    ServerDisconnect,
    Lost(String),
}

struct ConnectionTask {
    session: StreamSession,
    connected: Arc<AtomicBool>,
    cmd_rx: mpsc::Receiver<DriverCmd>,
    target: StreamTarget,
}

impl ConnectionTask {
    async fn run(mut self) {
        let name = self.session.intent().name().to_string();
        let policy = self.target.reconnect;
        let mut attempt: u32 = 0;

        loop {
            if self.session.is_closed() {
                break;
            }
            self.session.begin_connect();

            let established = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.cmd_rx) => break,
                result = establish(&self.target) => result,
            };

            match established {
                Ok((mut ws, handshake)) => {
                    attempt = 0;
                    let exit = self.pump(&mut ws, &handshake).await;
                    self.connected.store(false, Ordering::SeqCst);
                    match exit {
                        Exit::Shutdown => {
                            goodbye(&mut ws).await;
                            break;
                        }
                        Exit::ServerDisconnect => {
                            let _ = ws.close(None).await;
                            self.session.handle(TransportEvent::Disconnected {
                                reason: "io server disconnect".to_string(),
                                will_retry: false,
                            });
                            break;
                        }
                        Exit::Lost(reason) => {
                            let will_retry = policy.allows(attempt);
                            self.session.handle(TransportEvent::Disconnected { reason, will_retry });
                            if !will_retry {
                                break;
                            }
                        }
                    }
                }
                Err(message) => {
                    tracing::debug!(stream = %name, %message, "connect failed");
                    self.session.handle(TransportEvent::ConnectError(message));
                    if !policy.allows(attempt) {
                        tracing::warn!(stream = %name, attempt, "reconnection attempts exhausted");
                        self.session.handle(TransportEvent::Disconnected {
                            reason: "reconnect failed".to_string(),
                            will_retry: false,
                        });
                        break;
                    }
                }
            }

            let delay = policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            tracing::warn!(stream = %name, attempt, ?delay, "reconnecting");
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.cmd_rx) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!(stream = %name, "stream stopped");
    }

    /// Run one established connection until it ends.
    async fn pump(&mut self, ws: &mut WsStream, handshake: &OpenHandshake) -> Exit {
        let silence = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
        let mut deadline = Instant::now() + silence;

        let subscribe = self.session.handle(TransportEvent::Connected);
        for packet in subscribe {
            if let Err(e) = send_packet(ws, packet).await {
                return Exit::Lost(format!("subscribe failed: {e}"));
            }
        }
        self.connected.store(true, Ordering::SeqCst);

        loop {
            if self.session.is_closed() {
                return Exit::Shutdown;
            }
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(DriverCmd::Emit(packet)) => {
                        if let Err(e) = send_packet(ws, packet).await {
                            self.session.handle(TransportEvent::Error(e.clone()));
                            return Exit::Lost(e);
                        }
                    }
                    Some(DriverCmd::Shutdown) | None => return Exit::Shutdown,
                },

                _ = tokio::time::sleep_until(deadline) => {
                    return Exit::Lost("ping timeout".to_string());
                }

                frame = ws.next() => {
                    deadline = Instant::now() + silence;
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(exit) = self.on_frame(ws, text.as_str()).await {
                                return exit;
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            self.session.handle(TransportEvent::Error(
                                "binary frames are not supported".to_string(),
                            ));
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = ws.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Exit::Lost("transport close".to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            self.session.handle(TransportEvent::Error(e.to_string()));
                            return Exit::Lost("transport error".to_string());
                        }
                    }
                }
            }
        }
    }

    async fn on_frame(&mut self, ws: &mut WsStream, frame: &str) -> Option<Exit> {
        match EnginePacket::decode(frame) {
            Ok(EnginePacket::Ping) => {
                if let Err(e) = ws.send(Message::Text(EnginePacket::Pong.encode().into())).await {
                    return Some(Exit::Lost(format!("pong failed: {e}")));
                }
            }
            Ok(EnginePacket::Close) => return Some(Exit::Lost("transport close".to_string())),
            Ok(EnginePacket::Message(packet)) if !packet.in_default_namespace() => {
                tracing::trace!(namespace = packet.namespace(), "packet for another namespace ignored");
            }
            Ok(EnginePacket::Message(SocketPacket::Event { name, args, .. })) => {
                let payload = args.into_iter().next().unwrap_or(Value::Null);
                self.session.handle(TransportEvent::Event { name, payload });
            }
            Ok(EnginePacket::Message(SocketPacket::Disconnect { .. })) => {
                return Some(Exit::ServerDisconnect);
            }
            Ok(EnginePacket::Message(SocketPacket::ConnectError { message, .. })) => {
                self.session.handle(TransportEvent::ConnectError(message.clone()));
                return Some(Exit::Lost(message));
            }
            Ok(other) => tracing::trace!(?other, "ignored packet"),
            Err(e) => {
                self.session.handle(TransportEvent::Error(e.to_string()));
            }
        }
        None
    }
}

/// Resolve once a shutdown is requested or every handle is gone. Emits
/// queued while disconnected are dropped.
async fn wait_for_shutdown(cmd_rx: &mut mpsc::Receiver<DriverCmd>) {
    loop {
        match cmd_rx.recv().await {
            Some(DriverCmd::Emit(packet)) => {
                tracing::debug!(?packet, "emit dropped while disconnected");
            }
            Some(DriverCmd::Shutdown) | None => return,
        }
    }
}

async fn establish(target: &StreamTarget) -> Result<(WsStream, OpenHandshake), String> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(target)).await {
        Ok(result) => result,
        Err(_) => Err("timeout".to_string()),
    }
}

async fn handshake(target: &StreamTarget) -> Result<(WsStream, OpenHandshake), String> {
    let mut request = target
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| format!("bad socket request: {e}"))?;
    if let Some(cookie) = &target.cookie {
        let value = HeaderValue::from_str(cookie).map_err(|e| format!("bad cookie: {e}"))?;
        request.headers_mut().insert("cookie", value);
    }

    let (mut ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| e.to_string())?;

    let open = match next_packet(&mut ws).await? {
        EnginePacket::Open(open) => open,
        other => return Err(format!("expected open packet, got {other:?}")),
    };
    send_packet(&mut ws, SocketPacket::connect()).await?;

    loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Message(SocketPacket::Connect { .. }) => return Ok((ws, open)),
            EnginePacket::Message(SocketPacket::ConnectError { message, .. }) => return Err(message),
            EnginePacket::Ping => {
                ws.send(Message::Text(EnginePacket::Pong.encode().into()))
                    .await
                    .map_err(|e| e.to_string())?;
            }
            EnginePacket::Close => return Err("transport close".to_string()),
            _ => {}
        }
    }
}

async fn next_packet(ws: &mut WsStream) -> Result<EnginePacket, String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return EnginePacket::decode(text.as_str()).map_err(|e| e.to_string())
            }
            Some(Ok(Message::Close(_))) | None => return Err("transport close".to_string()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.to_string()),
        }
    }
}

async fn send_packet(ws: &mut WsStream, packet: SocketPacket) -> Result<(), String> {
    let frame = EnginePacket::Message(packet).encode();
    ws.send(Message::Text(frame.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Client-initiated disconnect: leave the namespace, then close.
async fn goodbye(ws: &mut WsStream) {
    let leave = SocketPacket::Disconnect {
        namespace: admin_core::socketio::DEFAULT_NAMESPACE.to_string(),
    };
    let _ = send_packet(ws, leave).await;
    let _ = ws.close(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::StreamKind;

    fn handle(name: &str) -> (ConnectionHandle, mpsc::Receiver<DriverCmd>) {
        let (commands, rx) = mpsc::channel(4);
        let handle = ConnectionHandle {
            control: Arc::new(StreamControl {
                name: name.to_string(),
                closed: Arc::new(AtomicBool::new(false)),
                connected: Arc::new(AtomicBool::new(true)),
                commands,
            }),
        };
        (handle, rx)
    }

    #[test]
    fn dropping_the_handle_requests_shutdown() {
        let (h, mut rx) = handle("dashboard");
        let control = h.control();
        drop(h);
        assert!(control.is_closed());
        assert!(matches!(rx.try_recv(), Ok(DriverCmd::Shutdown)));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (h, mut rx) = handle("bi");
        h.disconnect();
        h.disconnect();
        assert!(h.is_closed());
        assert!(!h.is_connected());
        assert!(matches!(rx.try_recv(), Ok(DriverCmd::Shutdown)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emit_after_close_is_an_error() {
        let (h, _rx) = handle("bi");
        h.disconnect();
        assert!(h.emit("x", Value::Null).is_err());
    }

    #[test]
    fn slot_supersedes_previous_stream() {
        let slot = StreamSlot::default();
        let (first, _rx1) = handle(StreamKind::Dashboard.name());
        let first = slot.replace(|| Ok(first)).unwrap();
        assert_eq!(slot.active().as_deref(), Some("dashboard"));

        let (second, _rx2) = handle(StreamKind::BusinessIntelligence.name());
        let second = slot.replace(|| Ok(second)).unwrap();
        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(slot.active().as_deref(), Some("bi"));

        assert!(slot.clear());
        assert!(second.is_closed());
        assert!(!slot.clear());
        assert_eq!(slot.active(), None);
    }

    #[test]
    fn failed_start_leaves_slot_empty() {
        let slot = StreamSlot::default();
        let (first, _rx) = handle("dashboard");
        let first = slot.replace(|| Ok(first)).unwrap();
        let err = slot
            .replace(|| Err(StreamError::Connect("refused".into())))
            .unwrap_err();
        assert_eq!(err, StreamError::Connect("refused".into()));
        assert!(first.is_closed());
        assert_eq!(slot.active(), None);
    }
}
