//! Persistence service: bounded background writer for the room store.
//!
//! DESIGN
//! ======
//! Every write goes through one bounded queue drained by a single task, so
//! websocket handling never waits on storage for element appends. Appends
//! are batched (by size, or on a short flush interval) and written per room
//! in queue order. Chat messages are written as they arrive.
//!
//! A clear is the one synchronous command: the requester awaits its result.
//! The worker flushes every pending append before deleting, so an element
//! committed before a clear can never reappear after it.
//!
//! ERROR HANDLING
//! ==============
//! Appends fail softly. A full queue drops the element with a warning; a
//! failing store is retried with linear back-off and the batch is dropped
//! with an error log after the last attempt. Live viewers already have the
//! element, so the only cost is its absence from a later replay. Clear
//! failures are returned to the caller, which surfaces them to the client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use frames::{ChatMessage, Element};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::env_parse;
use crate::services::store::{PersistenceError, RoomStore};
use crate::state::AppState;

const DEFAULT_ELEMENT_PERSIST_QUEUE_CAPACITY: usize = 8192;
const DEFAULT_ELEMENT_PERSIST_BATCH_SIZE: usize = 64;
const DEFAULT_ELEMENT_PERSIST_FLUSH_MS: u64 = 5;
const DEFAULT_ELEMENT_PERSIST_RETRIES: usize = 2;
const DEFAULT_ELEMENT_PERSIST_RETRY_BASE_MS: u64 = 20;

/// Tuning knobs for the persistence worker, loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct ElementPersistConfig {
    /// Bounded channel capacity for the persist queue.
    pub queue_capacity: usize,
    /// Maximum appends flushed per store write.
    pub batch_size: usize,
    /// How long to wait for the batch to fill before flushing, in milliseconds.
    pub flush_ms: u64,
    /// Write attempts per batch before it is dropped.
    pub retries: usize,
    /// Base delay in milliseconds for linear retry back-off.
    pub retry_base_ms: u64,
}

impl ElementPersistConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            queue_capacity: env_parse("ELEMENT_PERSIST_QUEUE_CAPACITY", DEFAULT_ELEMENT_PERSIST_QUEUE_CAPACITY).max(1),
            batch_size: env_parse("ELEMENT_PERSIST_BATCH_SIZE", DEFAULT_ELEMENT_PERSIST_BATCH_SIZE).max(1),
            flush_ms: env_parse("ELEMENT_PERSIST_FLUSH_MS", DEFAULT_ELEMENT_PERSIST_FLUSH_MS).max(1),
            retries: env_parse("ELEMENT_PERSIST_RETRIES", DEFAULT_ELEMENT_PERSIST_RETRIES).max(1),
            retry_base_ms: env_parse("ELEMENT_PERSIST_RETRY_BASE_MS", DEFAULT_ELEMENT_PERSIST_RETRY_BASE_MS),
        }
    }
}

impl Default for ElementPersistConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_ELEMENT_PERSIST_QUEUE_CAPACITY,
            batch_size: DEFAULT_ELEMENT_PERSIST_BATCH_SIZE,
            flush_ms: DEFAULT_ELEMENT_PERSIST_FLUSH_MS,
            retries: DEFAULT_ELEMENT_PERSIST_RETRIES,
            retry_base_ms: DEFAULT_ELEMENT_PERSIST_RETRY_BASE_MS,
        }
    }
}

/// Work item for the persistence worker.
#[derive(Debug)]
pub enum PersistCommand {
    Append { room_id: String, element: Element },
    Message(ChatMessage),
    /// Flush pending appends, delete the room's log, and report the result.
    Clear { room_id: String, reply: oneshot::Sender<Result<u64, PersistenceError>> },
}

// =============================================================================
// WORKER
// =============================================================================

/// Spawn the persistence worker and return its queue sender.
///
/// The worker exits once every sender is dropped, after flushing what it holds.
#[must_use]
pub fn spawn_persistence_worker(
    store: Arc<dyn RoomStore>,
    config: ElementPersistConfig,
) -> mpsc::Sender<PersistCommand> {
    let (tx, mut rx) = mpsc::channel::<PersistCommand>(config.queue_capacity);

    info!(
        queue_capacity = config.queue_capacity,
        batch_size = config.batch_size,
        flush_ms = config.flush_ms,
        retries = config.retries,
        retry_base_ms = config.retry_base_ms,
        "element persistence worker configured"
    );

    tokio::spawn(async move {
        let mut batch: Vec<(String, Element)> = Vec::with_capacity(config.batch_size);
        let mut ticker = tokio::time::interval(Duration::from_millis(config.flush_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        flush_batch_with_retry(store.as_ref(), &mut batch, config).await;
                        break;
                    };
                    match cmd {
                        PersistCommand::Append { room_id, element } => {
                            batch.push((room_id, element));
                            if batch.len() >= config.batch_size {
                                flush_batch_with_retry(store.as_ref(), &mut batch, config).await;
                            }
                        }
                        PersistCommand::Message(message) => {
                            let store = store.as_ref();
                            let message = &message;
                            if let Err(e) = with_retry(config, move || store.append_message(message)).await {
                                error!(error = %e, room_id = %message.room_id, "chat message persist failed after retries; dropping message");
                            }
                        }
                        PersistCommand::Clear { room_id, reply } => {
                            flush_batch_with_retry(store.as_ref(), &mut batch, config).await;
                            let result = store.clear_all(&room_id).await;
                            match &result {
                                Ok(removed) => info!(%room_id, removed, "room element log cleared"),
                                Err(e) => error!(error = %e, %room_id, "room clear failed"),
                            }
                            if reply.send(result).is_err() {
                                warn!(%room_id, "clear requester went away before the result");
                            }
                        }
                    }
                }
                _ = ticker.tick() => {
                    flush_batch_with_retry(store.as_ref(), &mut batch, config).await;
                }
            }
        }

        info!("element persistence worker stopped");
    });

    tx
}

/// Write the pending appends, grouped into runs of the same room.
async fn flush_batch_with_retry(store: &dyn RoomStore, batch: &mut Vec<(String, Element)>, config: ElementPersistConfig) {
    if batch.is_empty() {
        return;
    }

    let drained = std::mem::take(batch);
    for (room_id, elements) in group_by_room(drained) {
        let (room, items) = (room_id.as_str(), elements.as_slice());
        if let Err(e) = with_retry(config, move || store.append_elements(room, items)).await {
            error!(
                error = %e,
                %room_id,
                count = elements.len(),
                "element batch persist failed after retries; dropping elements"
            );
        }
    }
}

/// Split a queue-ordered batch into consecutive same-room runs.
pub(crate) fn group_by_room(batch: Vec<(String, Element)>) -> Vec<(String, Vec<Element>)> {
    let mut groups: Vec<(String, Vec<Element>)> = Vec::new();
    for (room_id, element) in batch {
        match groups.last_mut() {
            Some((last, elements)) if *last == room_id => elements.push(element),
            _ => groups.push((room_id, vec![element])),
        }
    }
    groups
}

/// Linear back-off before retry `attempt` (1-based), saturating instead of
/// overflowing for huge bases.
pub(crate) fn retry_delay(config: ElementPersistConfig, attempt: usize) -> Duration {
    let attempt = u64::try_from(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(attempt.saturating_mul(config.retry_base_ms))
}

async fn with_retry<F, Fut>(config: ElementPersistConfig, op: F) -> Result<(), PersistenceError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), PersistenceError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < config.retries => {
                warn!(error = %e, attempt, total = config.retries, "persist failed; retrying");
                tokio::time::sleep(retry_delay(config, attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// ENQUEUE
// =============================================================================

/// Best-effort, non-blocking enqueue of an element append.
///
/// Uses `try_send` so a slow store never adds latency to the relay path.
pub fn enqueue_element(state: &AppState, room_id: &str, element: &Element) {
    let cmd = PersistCommand::Append { room_id: room_id.to_owned(), element: element.clone() };
    match state.persist_tx.try_send(cmd) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(%room_id, element_id = %element.id, "persist queue full; dropping element");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!(%room_id, element_id = %element.id, "persist queue closed; dropping element");
        }
    }
}

/// Best-effort, non-blocking enqueue of a chat message.
pub fn enqueue_message(state: &AppState, message: &ChatMessage) {
    match state.persist_tx.try_send(PersistCommand::Message(message.clone())) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(room_id = %message.room_id, "persist queue full; dropping chat message");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!(room_id = %message.room_id, "persist queue closed; dropping chat message");
        }
    }
}

/// Clear a room's durable log, ordered after every append already queued.
///
/// # Errors
///
/// Returns the store error, or `WorkerUnavailable` if the worker has stopped.
pub async fn clear_room(state: &AppState, room_id: &str) -> Result<u64, PersistenceError> {
    let (reply, rx) = oneshot::channel();
    state
        .persist_tx
        .send(PersistCommand::Clear { room_id: room_id.to_owned(), reply })
        .await
        .map_err(|_| PersistenceError::WorkerUnavailable)?;
    rx.await.map_err(|_| PersistenceError::WorkerUnavailable)?
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
