//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room membership, chat, and persistence so route
//! handlers can stay focused on protocol translation.

pub mod chat;
pub mod memory_store;
pub mod persistence;
pub mod pg_store;
pub mod room;
pub mod store;
