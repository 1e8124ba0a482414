//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Two surfaces: a small REST API for out-of-band room creation and user
//! listing, and the per-room WebSocket endpoint that carries the command /
//! event stream. Everything else — page routing, rendering, styling — lives
//! in whatever frontend connects here.

pub mod rooms;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rooms", post(rooms::create_room))
        .route("/api/rooms/{room_id}/users", get(rooms::list_users))
        .route("/ws/{room_id}", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
