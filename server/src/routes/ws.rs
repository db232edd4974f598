//! WebSocket handler: the room session relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by client event
//! - Broadcast frames from room peers → forward to client
//!
//! Handler functions are pure business logic. They validate, mutate state,
//! and return an `Outcome`. The dispatch layer owns the outbound side:
//! reply to sender and relay to members. Chat is the one exception: the chat
//! service multicasts the stamped message itself.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames (protobuf binary or JSON text) → dispatch → Outcome
//! 3. Dispatch applies Outcome (reply / relay / broadcast)
//! 4. Close → part the joined room (evicting it if it was the last member)
//!
//! Outbound frames are always protobuf binary.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{Sink, SinkExt};
use frames::protocol::GATEWAY_ERROR;
use frames::{ClientEvent, Data, Element, FRAME_CODE, FRAME_MESSAGE, Frame, ServerEvent, Status};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::{chat, persistence, room};
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what. Handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Reply to the sender and relay a notification to every other member.
    ReplyAndRelay { reply: Data, relay: Frame },
    /// Reply to the sender and broadcast a notification to every member,
    /// sender included.
    ReplyAndBroadcast { reply: Data, broadcast: Frame },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);

    let Some(welcome) = ServerEvent::Connected { client_id: client_id.to_string() }.to_frame(None) else {
        return;
    };
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    // The room this connection has joined, if any.
    let mut current_room: Option<String> = None;

    'session: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break 'session };
                let Ok(msg) = msg else { break 'session };
                let replies = match msg {
                    Message::Binary(bytes) => {
                        process_inbound_bytes(&state, &mut current_room, client_id, &client_tx, &bytes).await
                    }
                    Message::Text(text) => {
                        process_inbound_text(&state, &mut current_room, client_id, &client_tx, text.as_str()).await
                    }
                    Message::Close(_) => break 'session,
                    _ => continue 'session,
                };
                if send_frames(&mut socket, &replies).await.is_err() {
                    break 'session;
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    if let Some(room_id) = current_room {
        room::part_room(&state, &room_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode one binary (protobuf) frame and process it.
async fn process_inbound_bytes(
    state: &AppState,
    current_room: &mut Option<String>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    bytes: &[u8],
) -> Vec<Frame> {
    match frames::decode_frame(bytes) {
        Ok(req) => process_inbound_frame(state, current_room, client_id, client_tx, req).await,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            vec![gateway_error(format!("invalid frame: {e}"))]
        }
    }
}

/// Parse one JSON text frame and process it.
async fn process_inbound_text(
    state: &AppState,
    current_room: &mut Option<String>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    match serde_json::from_str::<Frame>(text) {
        Ok(req) => process_inbound_frame(state, current_room, client_id, client_tx, req).await,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            vec![gateway_error(format!("invalid json: {e}"))]
        }
    }
}

/// Process one inbound request frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch and relay behavior without a socket.
async fn process_inbound_frame(
    state: &AppState,
    current_room: &mut Option<String>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    mut req: Frame,
) -> Vec<Frame> {
    // Stamp the connection id as `from`.
    req.from = Some(client_id.to_string());
    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    if req.status != Status::Request {
        return vec![req.error("expected a request frame")];
    }

    let event = match ClientEvent::from_frame(&req) {
        Ok(event) => event,
        Err(e) => return vec![req.error_from(&e)],
    };

    let result = match event {
        ClientEvent::Join { room_id } => Ok(handle_join(state, current_room, client_id, client_tx, room_id).await),
        ClientEvent::ElementCommitted { room_id, element } => {
            handle_commit(state, current_room.as_deref(), client_id, &req, &room_id, element)
        }
        ClientEvent::ClearAll { room_id } => handle_clear(state, current_room.as_deref(), &req, &room_id).await,
        ClientEvent::SendMessage { room_id, content } => {
            handle_chat(state, current_room.as_deref(), client_id, &req, &room_id, &content).await
        }
    };

    // Apply outcome; the dispatch layer owns all outbound logic.
    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::ReplyAndRelay { reply, relay }) => {
            if let Some(room_id) = current_room.as_deref() {
                room::broadcast(state, room_id, &relay, Some(client_id)).await;
            }
            vec![req.done_with(reply)]
        }
        Ok(Outcome::ReplyAndBroadcast { reply, broadcast }) => {
            if let Some(room_id) = current_room.as_deref() {
                room::broadcast(state, room_id, &broadcast, None).await;
            }
            vec![req.done_with(reply)]
        }
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn handle_join(
    state: &AppState,
    current_room: &mut Option<String>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    room_id: String,
) -> Outcome {
    // Part the current room if switching.
    if let Some(old_room) = current_room.take() {
        if old_room != room_id {
            room::part_room(state, &old_room, client_id).await;
        }
    }

    let members = room::join_room(state, &room_id, client_id, client_tx.clone()).await;

    let mut reply = Data::new();
    reply.insert("room_id".into(), Value::String(room_id.clone()));
    reply.insert("members".into(), Value::from(members));
    *current_room = Some(room_id);
    Outcome::Reply(reply)
}

fn handle_commit(
    state: &AppState,
    current_room: Option<&str>,
    client_id: Uuid,
    req: &Frame,
    room_id: &str,
    element: Element,
) -> Result<Outcome, Frame> {
    let room_id = room::require_member(current_room, room_id).map_err(|e| req.error_from(&e))?;

    let relay = ServerEvent::ElementCommitted { element: element.clone() }
        .to_frame(Some(room_id))
        .map(|frame| frame.with_from(client_id.to_string()))
        .ok_or_else(|| req.error("failed to build relay frame"))?;
    // Fire-and-forget: the relay never waits on storage.
    persistence::enqueue_element(state, room_id, &element);

    let mut reply = Data::new();
    reply.insert("id".into(), Value::String(element.id.to_string()));
    Ok(Outcome::ReplyAndRelay { reply, relay })
}

async fn handle_clear(state: &AppState, current_room: Option<&str>, req: &Frame, room_id: &str) -> Result<Outcome, Frame> {
    let room_id = room::require_member(current_room, room_id).map_err(|e| req.error_from(&e))?;

    // Synchronous: no member hears about the clear unless the log is gone.
    let removed = persistence::clear_room(state, room_id)
        .await
        .map_err(|e| req.error_from(&e))?;

    let broadcast = ServerEvent::Cleared { room_id: room_id.to_owned() }
        .to_frame(None)
        .ok_or_else(|| req.error("failed to build clear notification"))?;

    let mut reply = Data::new();
    reply.insert("removed".into(), Value::from(removed));
    Ok(Outcome::ReplyAndBroadcast { reply, broadcast })
}

async fn handle_chat(
    state: &AppState,
    current_room: Option<&str>,
    client_id: Uuid,
    req: &Frame,
    room_id: &str,
    content: &str,
) -> Result<Outcome, Frame> {
    let room_id = room::require_member(current_room, room_id).map_err(|e| req.error_from(&e))?;
    let message = chat::post_message(state, room_id, &client_id.to_string(), content).await;

    let mut reply = Data::new();
    reply.insert("created_at".into(), Value::from(message.created_at));
    Ok(Outcome::Reply(reply))
}

// =============================================================================
// HELPERS
// =============================================================================

fn gateway_error(message: String) -> Frame {
    Frame::request(GATEWAY_ERROR, Data::new()).with_data(FRAME_MESSAGE, message)
}

/// Send reply frames in order, stopping at the first failure.
async fn send_frames<S>(sink: &mut S, frames: &[Frame]) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    for frame in frames {
        send_frame(sink, frame).await?;
    }
    Ok(())
}

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    if frame.status == Status::Error {
        let code = frame.data_str(FRAME_CODE).unwrap_or("-");
        let message = frame.data_str(FRAME_MESSAGE).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    let bytes = frames::encode_frame(frame);
    sink.send(Message::Binary(bytes.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
