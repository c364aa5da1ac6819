//! I/O layer of the admin telemetry client.
//!
//! # Overview
//! Performs the requests that `admin-core` describes: a blocking ureq
//! transport for REST calls and a tokio driver for the Socket.IO streams.
//! `AdminApi` is the entry point; it groups every admin operation and owns
//! the single realtime stream slot.
//!
//! # Design
//! - `HttpTransport` is the seam between the facade and the network, so the
//!   facade is tested with an in-memory transport and the live tests use
//!   ureq against the mock server.
//! - Streams run on their own thread; the caller owns the returned
//!   `ConnectionHandle`, and `AdminApi` supersedes the previous stream on
//!   every `connect_*` call.
//! - `ClientConfig` comes from a builder or from `ADMIN_*` environment
//!   variables.

pub mod api;
pub mod config;
pub mod realtime;
pub mod transport;

pub use admin_core;
pub use api::{AdminApi, SearchQuery};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError, ReconnectPolicy};
pub use realtime::{ConnectionHandle, StreamSlot, StreamTarget};
pub use transport::{HttpTransport, UreqTransport};
