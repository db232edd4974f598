//! Room REST routes: replay and message history.
//!
//! SYSTEM CONTEXT
//! ==============
//! A client entering a room fetches `GET /rooms/{room_id}/elements` to render
//! the persisted log before subscribing over the websocket. Rooms are never
//! provisioned, so an unknown room answers `200 []`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use frames::protocol::validate_room_id;
use frames::{ChatMessage, Element};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::services::chat;
use crate::services::store::PersistenceError;
use crate::state::AppState;

/// One persisted element as served by the replay endpoint.
#[derive(Debug, Serialize)]
pub struct ElementRecord {
    pub room_id: String,
    #[serde(flatten)]
    pub element: Element,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

pub(crate) fn persistence_error_to_status(err: &PersistenceError) -> StatusCode {
    match err {
        PersistenceError::Database(_) | PersistenceError::WorkerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PersistenceError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `GET /rooms/{room_id}/elements`: the room's element log in insertion order.
pub async fn list_elements(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ElementRecord>>, StatusCode> {
    validate_room_id(&room_id).map_err(|_| StatusCode::BAD_REQUEST)?;

    let elements = state.store.list_elements(&room_id).await.map_err(|e| {
        error!(error = %e, %room_id, "element replay failed");
        persistence_error_to_status(&e)
    })?;

    Ok(Json(
        elements
            .into_iter()
            .map(|element| ElementRecord { room_id: room_id.clone(), element })
            .collect(),
    ))
}

/// `GET /rooms/{room_id}/messages?limit=N`: chat history, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    validate_room_id(&room_id).map_err(|_| StatusCode::BAD_REQUEST)?;

    let messages = chat::history(&state, &room_id, params.limit).await.map_err(|e| {
        error!(error = %e, %room_id, "message history failed");
        persistence_error_to_status(&e)
    })?;
    Ok(Json(messages))
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
