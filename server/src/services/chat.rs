//! Chat service: room message relay and history.
//!
//! Messages are stamped by the server, relayed to every member of the room
//! (sender included), and queued for persistence. History reads go straight
//! to the store.

use frames::{ChatMessage, ServerEvent, now_ms};

use crate::config::MAX_MESSAGE_HISTORY_LIMIT;
use crate::services::store::PersistenceError;
use crate::services::{persistence, room};
use crate::state::AppState;

/// Stamp, relay, and queue a chat message. Returns the delivered message.
pub async fn post_message(state: &AppState, room_id: &str, sender_id: &str, content: &str) -> ChatMessage {
    let message = ChatMessage {
        room_id: room_id.to_owned(),
        sender_id: sender_id.to_owned(),
        content: content.to_owned(),
        created_at: now_ms(),
    };

    if let Some(frame) = ServerEvent::Message(message.clone()).to_frame(Some(room_id)) {
        room::broadcast(state, room_id, &frame, None).await;
    }
    persistence::enqueue_message(state, &message);
    message
}

/// Up to `limit` messages of a room, oldest first. `None` uses the
/// configured default; explicit limits are clamped to `1..=500`.
///
/// # Errors
///
/// Returns the store error if history cannot be read.
pub async fn history(state: &AppState, room_id: &str, limit: Option<usize>) -> Result<Vec<ChatMessage>, PersistenceError> {
    let limit = limit
        .unwrap_or(state.config.message_history_limit)
        .clamp(1, MAX_MESSAGE_HISTORY_LIMIT);
    state.store.list_messages(room_id, limit).await
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
