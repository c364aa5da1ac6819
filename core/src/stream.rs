//! Realtime subscription state machine, independent of any socket.
//!
//! # Design
//! `StreamSession` owns one `SubscriptionIntent` (rooms to join plus the
//! event handlers to call) and reacts to `TransportEvent`s reported by the
//! host driver. Every `Connected` event, first connect or automatic
//! reconnect, yields the subscribe packet again; subscriptions are never
//! assumed to survive a network interruption. The driver must send the
//! returned packets before feeding the session any further frames.
//!
//! Handlers run behind a per-handler guard: an `Err` or a panic in one
//! handler is reported to `on_error` (or logged when there is none) and the
//! remaining handlers still run. Once the session is closed, through
//! `close` or the shared closed flag, no callback fires again.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::socketio::SocketPacket;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback for one named event.
pub type EventHandler = Arc<dyn Fn(&Value) -> Result<(), HandlerError> + Send + Sync>;

pub type ErrorCallback = Arc<dyn Fn(&StreamError) + Send + Sync>;

pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

pub type DisconnectCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Errors delivered to a stream's `on_error` callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The server refused or the socket could not be opened.
    #[error("connect_error: {0}")]
    Connect(String),

    /// A socket-level error on an established connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// A registered handler returned an error or panicked.
    #[error("handler for {event:?} failed: {message}")]
    Handler { event: String, message: String },
}

/// The three mutually exclusive admin streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Dashboard,
    BusinessIntelligence,
    SystemMetrics,
}

impl StreamKind {
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Dashboard => "dashboard",
            StreamKind::BusinessIntelligence => "bi",
            StreamKind::SystemMetrics => "system-metrics",
        }
    }

    /// Event the client emits to join its rooms, if the stream has any.
    pub fn subscribe_event(&self) -> Option<&'static str> {
        match self {
            StreamKind::Dashboard => None,
            StreamKind::BusinessIntelligence => Some("bi:subscribe"),
            StreamKind::SystemMetrics => Some("system:subscribe"),
        }
    }

    pub fn rooms(&self) -> &'static [&'static str] {
        match self {
            StreamKind::Dashboard => &[],
            StreamKind::BusinessIntelligence => &["bi-kpis", "bi-executions", "bi-insights"],
            StreamKind::SystemMetrics => &["system-metrics", "system-alerts"],
        }
    }

    pub fn events(&self) -> &'static [&'static str] {
        match self {
            StreamKind::Dashboard => &[events::DASHBOARD_INIT, events::DASHBOARD_UPDATE],
            StreamKind::BusinessIntelligence => {
                &[events::BI_KPI_UPDATE, events::BI_EXECUTION_STATUS, events::BI_INSIGHT]
            }
            StreamKind::SystemMetrics => &[events::SYSTEM_METRICS, events::SYSTEM_ALERT],
        }
    }

    /// An intent pre-filled with this stream's subscribe event and rooms.
    pub fn intent(&self) -> SubscriptionIntent {
        let intent = SubscriptionIntent::new(self.name());
        match self.subscribe_event() {
            Some(event) => intent.subscribe_with(event, self.rooms().iter().copied()),
            None => intent,
        }
    }
}

/// Event names used by the admin streams.
pub mod events {
    pub const DASHBOARD_INIT: &str = "dashboard:stats:init";
    pub const DASHBOARD_UPDATE: &str = "dashboard:stats:update";
    pub const BI_KPI_UPDATE: &str = "bi:kpi-update";
    pub const BI_EXECUTION_STATUS: &str = "bi:execution-status";
    pub const BI_INSIGHT: &str = "bi:insight-generated";
    pub const SYSTEM_METRICS: &str = "system:metrics";
    pub const SYSTEM_ALERT: &str = "system:alert";
}

/// Rooms to join and handlers to call, re-applied on every connect.
#[derive(Clone, Default)]
pub struct SubscriptionIntent {
    name: String,
    subscribe_event: Option<String>,
    rooms: Vec<String>,
    handlers: HashMap<String, Vec<EventHandler>>,
    on_error: Option<ErrorCallback>,
    on_connect: Option<ConnectCallback>,
    on_disconnect: Option<DisconnectCallback>,
}

impl fmt::Debug for SubscriptionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self.handlers.keys().collect();
        events.sort();
        f.debug_struct("SubscriptionIntent")
            .field("name", &self.name)
            .field("subscribe_event", &self.subscribe_event)
            .field("rooms", &self.rooms)
            .field("events", &events)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl SubscriptionIntent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join `rooms` by emitting `event` with `{ "rooms": [...] }` on connect.
    pub fn subscribe_with<I, S>(mut self, event: &str, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe_event = Some(event.to_string());
        for room in rooms {
            let room = room.into();
            if !self.rooms.contains(&room) {
                self.rooms.push(room);
            }
        }
        self
    }

    /// Register a handler; several handlers may share one event.
    pub fn on<F>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&StreamError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    pub fn has_handlers(&self, event: &str) -> bool {
        self.handlers.get(event).is_some_and(|h| !h.is_empty())
    }

    /// The packet that joins this intent's rooms, if any.
    pub fn subscribe_packet(&self) -> Option<SocketPacket> {
        let event = self.subscribe_event.as_ref()?;
        if self.rooms.is_empty() {
            return None;
        }
        Some(SocketPacket::event(event.clone(), json!({ "rooms": self.rooms })))
    }
}

/// Connection lifecycle as seen by the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// What the host driver observed on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String, will_retry: bool },
    ConnectError(String),
    Error(String),
    Event { name: String, payload: Value },
}

/// Sans-IO state machine for one subscription.
pub struct StreamSession {
    intent: SubscriptionIntent,
    state: ConnectionState,
    closed: Arc<AtomicBool>,
    connects: u32,
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("intent", &self.intent)
            .field("state", &self.state)
            .field("connects", &self.connects)
            .finish()
    }
}

impl StreamSession {
    pub fn new(intent: SubscriptionIntent) -> Self {
        Self::with_closed_flag(intent, Arc::new(AtomicBool::new(false)))
    }

    /// Share `closed` with a handle so teardown from another thread stops
    /// dispatch immediately.
    pub fn with_closed_flag(intent: SubscriptionIntent, closed: Arc<AtomicBool>) -> Self {
        Self {
            intent,
            state: ConnectionState::Disconnected,
            closed,
            connects: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_closed() {
            ConnectionState::Closed
        } else {
            self.state
        }
    }

    pub fn intent(&self) -> &SubscriptionIntent {
        &self.intent
    }

    /// Number of successful connects, reconnects included.
    pub fn connect_count(&self) -> u32 {
        self.connects
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed || self.closed.load(Ordering::SeqCst)
    }

    /// The driver is about to open (or reopen) the socket.
    pub fn begin_connect(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = match self.state {
            ConnectionState::Reconnecting => ConnectionState::Reconnecting,
            _ => ConnectionState::Connecting,
        };
    }

    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.state = ConnectionState::Closed;
    }

    /// Feed one transport event; returns the packets to send right away.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<SocketPacket> {
        if self.is_closed() {
            tracing::trace!(stream = %self.intent.name, ?event, "dropping event for closed stream");
            return Vec::new();
        }
        match event {
            TransportEvent::Connected => {
                self.state = ConnectionState::Connected;
                self.connects += 1;
                tracing::info!(
                    stream = %self.intent.name,
                    rooms = ?self.intent.rooms,
                    connects = self.connects,
                    "stream connected"
                );
                if let Some(cb) = self.intent.on_connect.clone() {
                    self.guarded("connect", || {
                        cb();
                        Ok(())
                    });
                }
                self.intent.subscribe_packet().into_iter().collect()
            }
            TransportEvent::Disconnected { reason, will_retry } => {
                self.state = if will_retry {
                    ConnectionState::Reconnecting
                } else {
                    ConnectionState::Disconnected
                };
                tracing::info!(stream = %self.intent.name, %reason, will_retry, "stream disconnected");
                if let Some(cb) = self.intent.on_disconnect.clone() {
                    self.guarded("disconnect", || {
                        cb(&reason);
                        Ok(())
                    });
                }
                Vec::new()
            }
            TransportEvent::ConnectError(message) => {
                if self.state == ConnectionState::Connected {
                    self.state = ConnectionState::Reconnecting;
                }
                self.report(StreamError::Connect(message));
                Vec::new()
            }
            TransportEvent::Error(message) => {
                self.report(StreamError::Transport(message));
                Vec::new()
            }
            TransportEvent::Event { name, payload } => {
                if self.state != ConnectionState::Connected {
                    tracing::debug!(stream = %self.intent.name, event = %name, "event before connect ignored");
                    return Vec::new();
                }
                self.dispatch(&name, &payload);
                Vec::new()
            }
        }
    }

    fn dispatch(&self, event: &str, payload: &Value) {
        let Some(handlers) = self.intent.handlers.get(event) else {
            tracing::trace!(stream = %self.intent.name, event, "no handler registered");
            return;
        };
        for handler in handlers {
            if self.is_closed() {
                return;
            }
            self.guarded(event, || handler(payload));
        }
    }

    /// Run `f`, turning an `Err` or a panic into a reported handler error.
    fn guarded(&self, event: &str, f: impl FnOnce() -> Result<(), HandlerError>) {
        let message = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };
        self.report(StreamError::Handler {
            event: event.to_string(),
            message,
        });
    }

    fn report(&self, error: StreamError) {
        match &self.intent.on_error {
            Some(cb) => {
                if catch_unwind(AssertUnwindSafe(|| cb(&error))).is_err() {
                    tracing::error!(stream = %self.intent.name, %error, "on_error callback panicked");
                }
            }
            None => tracing::error!(stream = %self.intent.name, %error, "unhandled stream error"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
