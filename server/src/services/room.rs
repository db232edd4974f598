//! Room service: multicast membership and relay.
//!
//! DESIGN
//! ======
//! A room is created implicitly by its first join and evicted from memory
//! when its last member parts. Membership is the only live state; the
//! element log belongs to the store and survives eviction.
//!
//! Broadcast holds the room map read lock only while pushing into member
//! channels. Delivery is best-effort `try_send`: a member whose buffer is
//! full or closed misses the frame and is expected to reconnect and replay.

use frames::{ErrorCode, Frame};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, RoomState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("join a room first")]
    NotJoined,
    #[error("not a member of room {0}")]
    NotMember(String),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined | Self::NotMember(_) => "E_NOT_JOINED",
        }
    }
}

/// Check that a connection joined to `current` may act on `room_id`.
///
/// # Errors
///
/// Returns [`RoomError`] if the connection has not joined, or joined a
/// different room.
pub fn require_member<'a>(current: Option<&'a str>, room_id: &str) -> Result<&'a str, RoomError> {
    match current {
        None => Err(RoomError::NotJoined),
        Some(joined) if joined == room_id => Ok(joined),
        Some(_) => Err(RoomError::NotMember(room_id.to_owned())),
    }
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Add a client to a room's multicast group, creating the room if needed.
/// Returns the member count after joining.
pub async fn join_room(state: &AppState, room_id: &str, client_id: Uuid, tx: mpsc::Sender<Frame>) -> usize {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(room_id.to_owned()).or_insert_with(RoomState::new);
    room.clients.insert(client_id, tx);
    let members = room.clients.len();
    info!(%room_id, %client_id, members, "client joined room");
    members
}

/// Remove a client from a room. Evicts the room once it has no members.
pub async fn part_room(state: &AppState, room_id: &str, client_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(room_id) else {
        return;
    };

    room.clients.remove(&client_id);
    info!(%room_id, %client_id, remaining = room.clients.len(), "client left room");

    if room.clients.is_empty() {
        rooms.remove(room_id);
        info!(%room_id, "evicted room from memory");
    }
}

/// Number of live members in a room (zero for unknown rooms).
pub async fn member_count(state: &AppState, room_id: &str) -> usize {
    let rooms = state.rooms.read().await;
    rooms.get(room_id).map_or(0, |room| room.clients.len())
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all members of a room, optionally excluding one.
/// Returns how many members the frame was queued for.
pub async fn broadcast(state: &AppState, room_id: &str, frame: &Frame, exclude: Option<Uuid>) -> usize {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(room_id) else {
        return 0;
    };

    let mut delivered = 0;
    for (client_id, tx) in &room.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        match tx.try_send(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%room_id, %client_id, syscall = %frame.syscall, "client channel full; dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(%room_id, %client_id, syscall = %frame.syscall, "client channel closed; dropping frame");
            }
        }
    }
    delivered
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
