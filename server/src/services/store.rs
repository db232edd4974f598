//! Room store: the persistence adapter behind the element log and chat.
//!
//! DESIGN
//! ======
//! Every operation is keyed purely by room id. Rooms are never provisioned:
//! an unknown room is simply one with an empty log. Two implementations
//! exist, [`crate::services::pg_store::PgRoomStore`] for Postgres and
//! [`crate::services::memory_store::MemoryRoomStore`] for tests and
//! database-less runs. Handlers only ever see `Arc<dyn RoomStore>`.
//!
//! ERROR HANDLING
//! ==============
//! Store errors are returned, never logged here. Callers decide: element
//! appends are fire-and-forget through the persistence worker, while clear
//! and the REST reads surface the failure to the client.

use async_trait::async_trait;
use frames::{ChatMessage, Element, ErrorCode};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("persistence worker is not running")]
    WorkerUnavailable,
}

impl ErrorCode for PersistenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::WorkerUnavailable => "E_PERSISTENCE_UNAVAILABLE",
            Self::Corrupt(_) => "E_PERSISTENCE_CORRUPT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::WorkerUnavailable)
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Durable per-room element log and chat history.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Append one element to the room's log. Appending an id the room already
    /// holds is a no-op.
    async fn append_element(&self, room_id: &str, element: &Element) -> Result<(), PersistenceError>;

    /// Append several elements in order.
    async fn append_elements(&self, room_id: &str, elements: &[Element]) -> Result<(), PersistenceError> {
        for element in elements {
            self.append_element(room_id, element).await?;
        }
        Ok(())
    }

    /// Every element of the room in insertion order. Empty for unknown rooms.
    async fn list_elements(&self, room_id: &str) -> Result<Vec<Element>, PersistenceError>;

    /// Delete the room's element log. Returns the number of removed elements.
    async fn clear_all(&self, room_id: &str) -> Result<u64, PersistenceError>;

    async fn append_message(&self, message: &ChatMessage) -> Result<(), PersistenceError>;

    /// Up to `limit` messages of the room, oldest first.
    async fn list_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>, PersistenceError>;
}
