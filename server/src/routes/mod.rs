//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the websocket session endpoint, the room replay REST
//! surface, and a health check under a single Axum router. CORS is open:
//! rooms carry no authorization at this layer.

pub mod rooms;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/rooms/{room_id}/elements", get(rooms::list_elements))
        .route("/rooms/{room_id}/messages", get(rooms::list_messages))
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
