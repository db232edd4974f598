//! Native room client for the whiteboard server.
//!
//! LIFECYCLE
//! =========
//! [`RoomClient::enter`] follows the replay-then-subscribe order every client
//! uses: fetch the persisted element log over REST, open the websocket, wait
//! for `session:connected`, then `room:join`. Elements committed between the
//! snapshot and the join reply can be missed; callers reconnect and replay
//! rather than gap-fill.
//!
//! Request methods (`commit`, `clear`, `chat`) wait for the terminal reply
//! to their own frame. Room notifications that arrive meanwhile are queued
//! and handed out by [`RoomClient::next_event`] in arrival order.

use std::collections::VecDeque;
use std::time::Duration;

use frames::{ChatMessage, ClientEvent, Element, Frame, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a request waits for its terminal reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// The room connection could not be opened or broke mid-session.
    /// Reconnect and replay.
    #[error("room transport unavailable: {0}")]
    TransportUnavailable(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    Closed,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("unexpected frame: {0}")]
    Protocol(#[from] frames::ProtocolError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("timed out waiting for a reply")]
    Timeout,
    #[error("server rejected {syscall}: {message}")]
    Rejected { syscall: String, code: Option<String>, message: String, retryable: bool },
}

impl ClientError {
    /// Grepable server error code, when the server supplied one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::TransportUnavailable(Box::new(error))
    }
}

// =============================================================================
// REST
// =============================================================================

/// `GET /rooms/{room_id}/elements`: the room's persisted log in order.
///
/// # Errors
///
/// Returns [`ClientError::Http`] when the server is unreachable and
/// [`ClientError::HttpStatus`] for a non-success answer.
pub async fn fetch_elements(http: &reqwest::Client, base_url: &str, room_id: &str) -> Result<Vec<Element>, ClientError> {
    let url = format!("{}/rooms/{room_id}/elements", base_url.trim_end_matches('/'));
    let response = checked(http.get(url).send().await?).await?;
    Ok(response.json::<Vec<Element>>().await?)
}

/// `GET /rooms/{room_id}/messages`: chat history, oldest first.
///
/// # Errors
///
/// Same as [`fetch_elements`].
pub async fn fetch_messages(
    http: &reqwest::Client,
    base_url: &str,
    room_id: &str,
    limit: Option<usize>,
) -> Result<Vec<ChatMessage>, ClientError> {
    let url = format!("{}/rooms/{room_id}/messages", base_url.trim_end_matches('/'));
    let request = match limit {
        Some(limit) => http.get(url).query(&[("limit", limit)]),
        None => http.get(url),
    };
    let response = checked(request.send().await?).await?;
    Ok(response.json::<Vec<ChatMessage>>().await?)
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::HttpStatus { status: status.as_u16(), body })
}

/// Websocket endpoint for an `http(s)://` base URL.
///
/// # Errors
///
/// Returns [`ClientError::InvalidBaseUrl`] for any other scheme.
pub fn ws_url(base_url: &str) -> Result<String, ClientError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws"));
    }
    Err(ClientError::InvalidBaseUrl(base_url.to_owned()))
}

// =============================================================================
// ROOM CLIENT
// =============================================================================

/// A joined room session over one websocket.
pub struct RoomClient {
    stream: WsStream,
    room_id: String,
    client_id: String,
    pending: VecDeque<ServerEvent>,
    reply_timeout: Duration,
}

impl RoomClient {
    /// Replay the room's log, then connect and join it.
    ///
    /// Returns the client together with the replayed elements.
    ///
    /// # Errors
    ///
    /// Fails if the replay request fails, the websocket cannot be opened
    /// ([`ClientError::TransportUnavailable`]), or the join is rejected.
    pub async fn enter(base_url: &str, room_id: &str) -> Result<(Self, Vec<Element>), ClientError> {
        let http = reqwest::Client::new();
        let snapshot = fetch_elements(&http, base_url, room_id).await?;
        let client = Self::connect(base_url, room_id).await?;
        Ok((client, snapshot))
    }

    /// Connect and join without replaying.
    ///
    /// # Errors
    ///
    /// See [`RoomClient::enter`].
    pub async fn connect(base_url: &str, room_id: &str) -> Result<Self, ClientError> {
        let (mut stream, _) = connect_async(ws_url(base_url)?).await?;

        let client_id = loop {
            let frame = recv_frame(&mut stream, DEFAULT_REPLY_TIMEOUT).await?;
            if let Ok(ServerEvent::Connected { client_id }) = ServerEvent::from_frame(&frame) {
                break client_id;
            }
        };

        let mut client = Self {
            stream,
            room_id: room_id.to_owned(),
            client_id,
            pending: VecDeque::new(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        };
        client.request(ClientEvent::Join { room_id: room_id.to_owned() }).await?;
        Ok(client)
    }

    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Connection id assigned by the server; relayed frames carry it as `from`.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Publish a finished element to the room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] with `E_INVALID_ELEMENT` when the
    /// server refuses the element.
    pub async fn commit(&mut self, element: &Element) -> Result<(), ClientError> {
        self.request(ClientEvent::ElementCommitted { room_id: self.room_id.clone(), element: element.clone() })
            .await?;
        Ok(())
    }

    /// Clear the room log. Returns the number of elements removed.
    ///
    /// Every member, this one included, then receives
    /// [`ServerEvent::Cleared`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] (retryable) when the log could not
    /// be cleared; no member is notified in that case.
    pub async fn clear(&mut self) -> Result<u64, ClientError> {
        let reply = self.request(ClientEvent::ClearAll { room_id: self.room_id.clone() }).await?;
        Ok(reply.data.get("removed").and_then(Value::as_u64).unwrap_or(0))
    }

    /// Post a chat line. Returns its server timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for empty content.
    pub async fn chat(&mut self, content: &str) -> Result<i64, ClientError> {
        let reply = self
            .request(ClientEvent::SendMessage { room_id: self.room_id.clone(), content: content.to_owned() })
            .await?;
        Ok(reply.data.get("created_at").and_then(Value::as_i64).unwrap_or(0))
    }

    /// Next room notification, waiting as long as it takes.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] when the server hangs up.
    pub async fn next_event(&mut self) -> Result<ServerEvent, ClientError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        loop {
            let frame = recv_any(&mut self.stream).await?;
            if let Ok(event) = ServerEvent::from_frame(&frame) {
                return Ok(event);
            }
        }
    }

    /// Close the websocket. The server parts the room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportUnavailable`] if the close handshake
    /// cannot be sent.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }

    async fn request(&mut self, event: ClientEvent) -> Result<Frame, ClientError> {
        let req = event.to_frame();
        self.stream.send(Message::Binary(frames::encode_frame(&req).into())).await?;

        loop {
            let frame = recv_frame(&mut self.stream, self.reply_timeout).await?;
            if frame.parent_id.as_deref() == Some(req.id.as_str()) && frame.status.is_terminal() {
                return match ServerEvent::from_frame(&frame)? {
                    ServerEvent::Failed { syscall, code, message, retryable, .. } => {
                        Err(ClientError::Rejected { syscall, code, message, retryable })
                    }
                    _ => Ok(frame),
                };
            }
            if let Ok(event) = ServerEvent::from_frame(&frame) {
                self.pending.push_back(event);
            }
        }
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

async fn recv_frame(stream: &mut WsStream, timeout: Duration) -> Result<Frame, ClientError> {
    tokio::time::timeout(timeout, recv_any(stream))
        .await
        .map_err(|_| ClientError::Timeout)?
}

async fn recv_any(stream: &mut WsStream) -> Result<Frame, ClientError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(ClientError::Closed);
        };
        match message? {
            Message::Binary(bytes) => return Ok(frames::decode_frame(&bytes)?),
            Message::Text(text) => return Ok(serde_json::from_str::<Frame>(text.as_str())?),
            Message::Close(_) => return Err(ClientError::Closed),
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
