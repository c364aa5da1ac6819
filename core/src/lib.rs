//! Sans-IO core of the admin telemetry client.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern), normalizes the backend's
//! inconsistent list envelopes into `Page<T>`, and runs the realtime
//! subscription state machine over decoded Socket.IO frames. The
//! `admin-client` crate supplies the sockets.
//!
//! # Design
//! - `AdminClient` is stateless: it holds the base URL and credential policy.
//! - `normalize_page` is a pure function parametrized by the domain key.
//! - `StreamSession` consumes `TransportEvent`s and returns the packets to
//!   send, so reconnect and isolation rules are testable without a server.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod cookies;
pub mod error;
pub mod http;
pub mod multipart;
pub mod paginate;
pub mod query;
pub mod socketio;
pub mod stream;
pub mod types;

pub use client::{resolve_error_message, AdminClient, Payload, RequestBody, ResponseKind};
pub use cookies::CookieStore;
pub use error::{ApiError, ProtocolError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use multipart::MultipartForm;
pub use paginate::{normalize_page, Page, PageDialect, PageRequest, PageSpec};
pub use query::QueryParams;
pub use socketio::{EnginePacket, OpenHandshake, SocketPacket};
pub use stream::{
    ConnectionState, HandlerError, StreamError, StreamKind, StreamSession, SubscriptionIntent,
    TransportEvent,
};
pub use types::{AdminUser, DashboardSnapshot};
