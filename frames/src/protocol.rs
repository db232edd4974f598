//! Synchronization protocol between a canvas client and the room session.
//!
//! Every event travels as a [`Frame`]; this module fixes the syscall names and
//! provides typed views in both directions so neither side hand-parses
//! `data` maps.
//!
//! Client → server: [`ClientEvent`] (`room:join`, `element:commit`,
//! `room:clear`, `chat:send`). Server → client: [`ServerEvent`] (relayed
//! elements, clear notifications, chat, and terminal replies to requests).
//! Disconnect has no frame; it is the transport closing.

#[cfg(test)]
#[path = "protocol_test.rs"]
mod protocol_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::{Element, ElementError};
use crate::{Data, ErrorCode, FRAME_CODE, FRAME_MESSAGE, FRAME_RETRYABLE, Frame, Status};

pub const SESSION_CONNECTED: &str = "session:connected";
pub const ROOM_JOIN: &str = "room:join";
pub const ROOM_CLEAR: &str = "room:clear";
pub const ROOM_CLEARED: &str = "room:cleared";
pub const ELEMENT_COMMIT: &str = "element:commit";
pub const CHAT_SEND: &str = "chat:send";
pub const CHAT_MESSAGE: &str = "chat:message";
pub const GATEWAY_ERROR: &str = "gateway:error";

/// Longest accepted room identifier, in characters.
pub const MAX_ROOM_ID_LEN: usize = 64;

const KEY_ROOM_ID: &str = "room_id";
const KEY_ELEMENT: &str = "element";
const KEY_CONTENT: &str = "content";
const KEY_CLIENT_ID: &str = "client_id";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),
    #[error("malformed element: {0}")]
    MalformedElement(serde_json::Error),
    #[error("invalid element: {0}")]
    InvalidElement(#[from] ElementError),
    #[error("malformed chat message: {0}")]
    MalformedMessage(serde_json::Error),
    #[error("unexpected syscall: {0}")]
    UnexpectedSyscall(String),
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "E_MISSING_FIELD",
            Self::InvalidRoomId(_) => "E_INVALID_ROOM",
            Self::MalformedElement(_) => "E_MALFORMED_ELEMENT",
            Self::InvalidElement(_) => "E_INVALID_ELEMENT",
            Self::MalformedMessage(_) => "E_MALFORMED_MESSAGE",
            Self::UnexpectedSyscall(_) => "E_UNEXPECTED_SYSCALL",
        }
    }
}

/// A chat line in a room's message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Check that a room id is usable as a routing key and a path segment.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidRoomId`] for empty, overlong, or
/// whitespace/slash-containing ids.
pub fn validate_room_id(room_id: &str) -> Result<(), ProtocolError> {
    let valid = !room_id.is_empty()
        && room_id.chars().count() <= MAX_ROOM_ID_LEN
        && !room_id.chars().any(|c| c.is_whitespace() || c == '/');
    if valid { Ok(()) } else { Err(ProtocolError::InvalidRoomId(room_id.to_owned())) }
}

// =============================================================================
// CLIENT EVENTS
// =============================================================================

/// Events a client sends to the room session.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join { room_id: String },
    ElementCommitted { room_id: String, element: Element },
    ClearAll { room_id: String },
    SendMessage { room_id: String, content: String },
}

impl ClientEvent {
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Self::Join { room_id }
            | Self::ElementCommitted { room_id, .. }
            | Self::ClearAll { room_id }
            | Self::SendMessage { room_id, .. } => room_id,
        }
    }

    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::Join { .. } => ROOM_JOIN,
            Self::ElementCommitted { .. } => ELEMENT_COMMIT,
            Self::ClearAll { .. } => ROOM_CLEAR,
            Self::SendMessage { .. } => CHAT_SEND,
        }
    }

    /// Build the request frame for this event, addressed to its room.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let mut data = Data::new();
        match self {
            Self::ElementCommitted { element, .. } => {
                data.insert(KEY_ELEMENT.into(), element_value(element));
            }
            Self::SendMessage { content, .. } => {
                data.insert(KEY_CONTENT.into(), Value::String(content.clone()));
            }
            Self::Join { .. } | Self::ClearAll { .. } => {}
        }
        Frame::request(self.syscall(), data).with_room_id(self.room_id())
    }

    /// Parse an inbound request frame.
    ///
    /// The room comes from the envelope, falling back to `data.room_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for unknown syscalls, missing or invalid
    /// room ids, and malformed or invalid elements.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        let room_id = frame
            .room_id
            .as_deref()
            .or_else(|| frame.data_str(KEY_ROOM_ID))
            .ok_or(ProtocolError::MissingField(KEY_ROOM_ID))?
            .to_owned();
        validate_room_id(&room_id)?;

        match frame.syscall.as_str() {
            ROOM_JOIN => Ok(Self::Join { room_id }),
            ROOM_CLEAR => Ok(Self::ClearAll { room_id }),
            ELEMENT_COMMIT => {
                let element = element_from_data(&frame.data)?;
                element.validate()?;
                Ok(Self::ElementCommitted { room_id, element })
            }
            CHAT_SEND => {
                let content = frame
                    .data_str(KEY_CONTENT)
                    .filter(|c| !c.trim().is_empty())
                    .ok_or(ProtocolError::MissingField(KEY_CONTENT))?
                    .to_owned();
                Ok(Self::SendMessage { room_id, content })
            }
            other => Err(ProtocolError::UnexpectedSyscall(other.to_owned())),
        }
    }
}

// =============================================================================
// SERVER EVENTS
// =============================================================================

/// Events the room session delivers to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// First frame on every connection.
    Connected { client_id: String },
    /// A peer committed an element.
    ElementCommitted { element: Element },
    /// The room log was cleared; drop every local element.
    Cleared { room_id: String },
    /// A chat line (including the receiver's own).
    Message(ChatMessage),
    /// A request completed.
    Ack { parent_id: String, syscall: String },
    /// A request failed, or the server could not parse a frame.
    Failed { parent_id: Option<String>, syscall: String, code: Option<String>, message: String, retryable: bool },
}

impl ServerEvent {
    /// Build the notification frame for a relayed event.
    ///
    /// `Ack` and `Failed` are replies and are built from the request frame
    /// instead; for those this returns `None`.
    #[must_use]
    pub fn to_frame(&self, room_id: Option<&str>) -> Option<Frame> {
        let frame = match self {
            Self::Connected { client_id } => {
                Frame::request(SESSION_CONNECTED, Data::new()).with_data(KEY_CLIENT_ID, client_id.clone())
            }
            Self::ElementCommitted { element } => {
                Frame::request(ELEMENT_COMMIT, Data::new()).with_data(KEY_ELEMENT, element_value(element))
            }
            Self::Cleared { room_id } => Frame::request(ROOM_CLEARED, Data::new()).with_room_id(room_id.clone()),
            Self::Message(message) => {
                let Value::Object(data) = serde_json::to_value(message).unwrap_or_default() else {
                    return None;
                };
                Frame::request(CHAT_MESSAGE, data)
            }
            Self::Ack { .. } | Self::Failed { .. } => return None,
        };
        Some(match (room_id, &frame.room_id) {
            (Some(room_id), None) => frame.with_room_id(room_id),
            _ => frame,
        })
    }

    /// Interpret a frame received from the server.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for unknown notification syscalls and
    /// malformed payloads.
    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        match frame.status {
            Status::Done => {
                return Ok(Self::Ack {
                    parent_id: frame.parent_id.clone().unwrap_or_default(),
                    syscall: frame.syscall.clone(),
                });
            }
            Status::Error => {
                return Ok(Self::Failed {
                    parent_id: frame.parent_id.clone(),
                    syscall: frame.syscall.clone(),
                    code: frame.data_str(FRAME_CODE).map(str::to_owned),
                    message: frame.data_str(FRAME_MESSAGE).unwrap_or_default().to_owned(),
                    retryable: frame
                        .data
                        .get(FRAME_RETRYABLE)
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                });
            }
            Status::Request => {}
        }

        match frame.syscall.as_str() {
            SESSION_CONNECTED => Ok(Self::Connected {
                client_id: frame
                    .data_str(KEY_CLIENT_ID)
                    .ok_or(ProtocolError::MissingField(KEY_CLIENT_ID))?
                    .to_owned(),
            }),
            ELEMENT_COMMIT => Ok(Self::ElementCommitted { element: element_from_data(&frame.data)? }),
            ROOM_CLEARED => Ok(Self::Cleared {
                room_id: frame
                    .room_id
                    .clone()
                    .ok_or(ProtocolError::MissingField(KEY_ROOM_ID))?,
            }),
            CHAT_MESSAGE => serde_json::from_value(Value::Object(frame.data.clone()))
                .map(Self::Message)
                .map_err(ProtocolError::MalformedMessage),
            GATEWAY_ERROR => Ok(Self::Failed {
                parent_id: None,
                syscall: frame.syscall.clone(),
                code: None,
                message: frame.data_str(FRAME_MESSAGE).unwrap_or_default().to_owned(),
                retryable: false,
            }),
            other => Err(ProtocolError::UnexpectedSyscall(other.to_owned())),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn element_value(element: &Element) -> Value {
    serde_json::to_value(element).unwrap_or(Value::Null)
}

fn element_from_data(data: &Data) -> Result<Element, ProtocolError> {
    let value = data
        .get(KEY_ELEMENT)
        .cloned()
        .ok_or(ProtocolError::MissingField(KEY_ELEMENT))?;
    serde_json::from_value(value).map_err(ProtocolError::MalformedElement)
}
