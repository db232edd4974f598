//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the room store, the live room map, and the persistence queue.
//! A room exists in the map only while it has members; its durable log
//! lives in the store regardless.

use std::collections::HashMap;
use std::sync::Arc;

use frames::Frame;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::services::persistence::{self, ElementPersistConfig, PersistCommand};
use crate::services::store::RoomStore;

// =============================================================================
// ROOM STATE
// =============================================================================

/// Per-room live state: the multicast group.
#[derive(Default)]
pub struct RoomState {
    /// Connected members: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RoomStore>,
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
    pub persist_tx: mpsc::Sender<PersistCommand>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build the state and spawn the persistence worker over `store`.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn RoomStore>, config: ServerConfig, persist: ElementPersistConfig) -> Self {
        let persist_tx = persistence::spawn_persistence_worker(store.clone(), persist);
        Self { store, rooms: Arc::new(RwLock::new(HashMap::new())), persist_tx, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_state_new_is_empty() {
        let rs = RoomState::new();
        assert!(rs.clients.is_empty());
    }

    #[tokio::test]
    async fn app_state_starts_with_no_rooms() {
        let state = test_helpers::test_app_state();
        assert!(state.rooms.read().await.is_empty());
        assert_eq!(state.config.port, 5001);
    }

    #[tokio::test]
    async fn cloned_state_shares_rooms() {
        let state = test_helpers::test_app_state();
        let clone = state.clone();
        let _rx = test_helpers::seed_member(&state, "r1", Uuid::new_v4()).await;
        assert!(clone.rooms.read().await.contains_key("r1"));
    }
}
