pub mod error;
mod handlers;

use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::hub::ConnectionHub;
use crate::protocol::Heartbeat;
use crate::shutdown::ShutdownCoordinator;

use handlers::*;

/// Path socket.io-client connects to by default.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

#[derive(Clone)]
pub struct AppState {
    pub hub: ConnectionHub,
    pub shutdown: ShutdownCoordinator,
    /// Settings with the port the listener actually bound.
    pub settings: Arc<Settings>,
    pub heartbeat: Heartbeat,
}

impl AppState {
    pub fn new(hub: ConnectionHub, shutdown: ShutdownCoordinator, settings: Arc<Settings>) -> Self {
        Self {
            hub,
            shutdown,
            settings,
            heartbeat: Heartbeat::default(),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

pub fn router(state: AppState) -> Router {
    // The user script runs inside arbitrary video pages.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(status))
        .route("/socket.io", get(socket_io))
        .route(SOCKET_IO_PATH, get(socket_io))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
