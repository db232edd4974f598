//! In-process [`RoomStore`] used when no database is configured and in tests.
//!
//! Same contract as the Postgres store: insertion order is preserved, an id
//! already present in a room is not appended twice, and unknown rooms read
//! as empty. Contents are lost when the process exits.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use frames::{ChatMessage, Element, ElementId};
use tokio::sync::RwLock;

use super::store::{PersistenceError, RoomStore};

#[derive(Default)]
struct RoomLog {
    elements: Vec<Element>,
    ids: HashSet<ElementId>,
    messages: Vec<ChatMessage>,
}

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, RoomLog>>,
}

impl MemoryRoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn append_element(&self, room_id: &str, element: &Element) -> Result<(), PersistenceError> {
        let mut rooms = self.rooms.write().await;
        let log = rooms.entry(room_id.to_owned()).or_default();
        if log.ids.insert(element.id) {
            log.elements.push(element.clone());
        }
        Ok(())
    }

    async fn append_elements(&self, room_id: &str, elements: &[Element]) -> Result<(), PersistenceError> {
        let mut rooms = self.rooms.write().await;
        let log = rooms.entry(room_id.to_owned()).or_default();
        for element in elements {
            if log.ids.insert(element.id) {
                log.elements.push(element.clone());
            }
        }
        Ok(())
    }

    async fn list_elements(&self, room_id: &str) -> Result<Vec<Element>, PersistenceError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).map(|log| log.elements.clone()).unwrap_or_default())
    }

    async fn clear_all(&self, room_id: &str) -> Result<u64, PersistenceError> {
        let mut rooms = self.rooms.write().await;
        let Some(log) = rooms.get_mut(room_id) else {
            return Ok(0);
        };
        let removed = log.elements.len() as u64;
        log.elements.clear();
        log.ids.clear();
        Ok(removed)
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), PersistenceError> {
        let mut rooms = self.rooms.write().await;
        let log = rooms.entry(message.room_id.clone()).or_default();
        // Keep history sorted by timestamp; equal timestamps stay in arrival order.
        let at = log.messages.partition_point(|m| m.created_at <= message.created_at);
        log.messages.insert(at, message.clone());
        Ok(())
    }

    async fn list_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>, PersistenceError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room_id)
            .map(|log| log.messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_store_test.rs"]
mod tests;
