//! Room session server for the collaborative whiteboard.
//!
//! ARCHITECTURE
//! ============
//! `routes` translates websocket frames and REST requests into calls on
//! `services`, which own room membership, chat, and the persistence worker.
//! The durable log sits behind the `RoomStore` trait: Postgres when
//! `DATABASE_URL` is set, an in-memory store otherwise.

pub mod config;
pub mod db;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::services::memory_store::MemoryRoomStore;
use crate::services::pg_store::PgRoomStore;
use crate::services::store::RoomStore;

/// Open the configured room store, running migrations for Postgres.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is set but the database cannot be
/// reached or migrated.
pub async fn open_store(config: &ServerConfig) -> Result<Arc<dyn RoomStore>, sqlx::Error> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL not set; using in-memory room store (contents are lost on restart)");
        return Ok(Arc::new(MemoryRoomStore::new()));
    };

    let pool = db::init_pool(database_url, config.db_max_connections).await?;
    info!(max_connections = config.db_max_connections, "postgres room store ready");
    Ok(Arc::new(PgRoomStore::new(pool)))
}
