//! Mock admin backend.
//!
//! # Overview
//! Serves the admin REST API under `/api/admin` with the same inconsistent
//! envelopes the real backend uses (`{ users, total }`, `{ rows, total: "3" }`,
//! bare arrays, `{ themes, pagination }`), JSON and plain-text errors, a
//! `text/css` theme preview, and a minimal Socket.IO endpoint at
//! `/socket.io/`. Integration tests drive the realtime side through `Hub`.

pub mod rest;
pub mod socket;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

pub use rest::Store;
pub use socket::Hub;

pub type Db = Arc<RwLock<Store>>;

/// Shared state of one server instance.
#[derive(Clone, Default)]
pub struct AppState {
    pub db: Db,
    pub hub: Hub,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn app() -> Router {
    app_with_state(AppState::new())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .nest("/api/admin", rest::routes())
        .route("/socket.io/", get(socket::upgrade))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::new()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}
