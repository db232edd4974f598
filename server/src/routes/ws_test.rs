use super::*;
use crate::state::test_helpers::{self, FailingStore, dummy_element};
use frames::{ChatMessage, FRAME_RETRYABLE, Point, Shape};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

// =============================================================================
// Helpers
// =============================================================================

/// One simulated connection: its id, joined room, and outbound channel.
struct Conn {
    client_id: Uuid,
    room: Option<String>,
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

impl Conn {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Frame>(16);
        Self { client_id: Uuid::new_v4(), room: None, tx, rx }
    }

    async fn send(&mut self, state: &AppState, event: &ClientEvent) -> Vec<Frame> {
        process_inbound_frame(state, &mut self.room, self.client_id, &self.tx, event.to_frame()).await
    }

    async fn join(&mut self, state: &AppState, room_id: &str) {
        let replies = self.send(state, &ClientEvent::Join { room_id: room_id.into() }).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, Status::Done);
    }
}

async fn recv_broadcast(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("broadcast receive timed out")
        .expect("broadcast channel closed unexpectedly")
}

async fn assert_no_broadcast(rx: &mut mpsc::Receiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected no broadcast frame"
    );
}

fn single(replies: Vec<Frame>) -> Frame {
    assert_eq!(replies.len(), 1, "expected exactly one reply");
    replies.into_iter().next().expect("one reply")
}

fn commit(room_id: &str, element: Element) -> ClientEvent {
    ClientEvent::ElementCommitted { room_id: room_id.into(), element }
}

async fn wait_for_stored(state: &AppState, room_id: &str, count: usize) -> Vec<Element> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    loop {
        let elements = state.store.list_elements(room_id).await.unwrap();
        if elements.len() >= count || tokio::time::Instant::now() >= deadline {
            return elements;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Join
// =============================================================================

#[tokio::test]
async fn join_replies_with_room_and_member_count() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let mut b = Conn::new();
    a.join(&state, "r1").await;

    let reply = single(b.send(&state, &ClientEvent::Join { room_id: "r1".into() }).await);
    assert_eq!(reply.syscall, "room:join");
    assert_eq!(reply.data_str("room_id"), Some("r1"));
    assert_eq!(reply.data.get("members"), Some(&serde_json::json!(2)));
    assert_eq!(b.room.as_deref(), Some("r1"));
}

#[tokio::test]
async fn joining_another_room_parts_the_first() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    a.join(&state, "r1").await;
    a.join(&state, "r2").await;

    assert_eq!(room::member_count(&state, "r1").await, 0);
    assert!(!state.rooms.read().await.contains_key("r1"));
    assert_eq!(room::member_count(&state, "r2").await, 1);
}

#[tokio::test]
async fn rejoining_same_room_keeps_single_membership() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    a.join(&state, "r1").await;
    a.join(&state, "r1").await;
    assert_eq!(room::member_count(&state, "r1").await, 1);
}

// =============================================================================
// Element commit
// =============================================================================

#[tokio::test]
async fn commit_before_join_is_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();

    let reply = single(a.send(&state, &commit("r1", dummy_element())).await);
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_NOT_JOINED"));
}

#[tokio::test]
async fn commit_to_other_room_is_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    a.join(&state, "r1").await;

    let reply = single(a.send(&state, &commit("r2", dummy_element())).await);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_NOT_JOINED"));
}

#[tokio::test]
async fn commit_relays_to_peers_only_and_persists() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let mut b = Conn::new();
    let mut c = Conn::new();
    let mut other = Conn::new();
    a.join(&state, "r1").await;
    b.join(&state, "r1").await;
    c.join(&state, "r1").await;
    other.join(&state, "r2").await;

    let element = dummy_element();
    let reply = single(a.send(&state, &commit("r1", element.clone())).await);
    assert_eq!(reply.status, Status::Done);
    assert_eq!(reply.data_str("id"), Some(element.id.to_string().as_str()));

    for peer in [&mut b, &mut c] {
        let frame = recv_broadcast(&mut peer.rx).await;
        assert_eq!(frame.status, Status::Request);
        assert_eq!(frame.room_id.as_deref(), Some("r1"));
        assert_eq!(frame.from, Some(a.client_id.to_string()));
        assert_eq!(ServerEvent::from_frame(&frame).unwrap(), ServerEvent::ElementCommitted { element: element.clone() });
    }
    assert_no_broadcast(&mut a.rx).await;
    assert_no_broadcast(&mut other.rx).await;

    assert_eq!(wait_for_stored(&state, "r1", 1).await, vec![element]);
}

#[tokio::test]
async fn invalid_element_is_rejected_without_relay() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let mut b = Conn::new();
    a.join(&state, "r1").await;
    b.join(&state, "r1").await;

    let bad = Element::new(Shape::Path { points: vec![Point::new(0.0, 0.0)] }, "#000000", 0.0);
    let reply = single(a.send(&state, &commit("r1", bad)).await);
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_INVALID_ELEMENT"));
    assert_no_broadcast(&mut b.rx).await;
}

#[tokio::test]
async fn commit_relays_even_when_store_fails() {
    let state = test_helpers::test_app_state_with_store(Arc::new(FailingStore::default()));
    let mut a = Conn::new();
    let mut b = Conn::new();
    a.join(&state, "r1").await;
    b.join(&state, "r1").await;

    let reply = single(a.send(&state, &commit("r1", dummy_element())).await);
    assert_eq!(reply.status, Status::Done);
    assert_eq!(recv_broadcast(&mut b.rx).await.syscall, "element:commit");
}

// =============================================================================
// Clear
// =============================================================================

#[tokio::test]
async fn clear_empties_log_and_notifies_every_member() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let mut b = Conn::new();
    a.join(&state, "r1").await;
    b.join(&state, "r1").await;
    a.send(&state, &commit("r1", dummy_element())).await;
    a.send(&state, &commit("r1", dummy_element())).await;
    recv_broadcast(&mut b.rx).await;
    recv_broadcast(&mut b.rx).await;

    let reply = single(b.send(&state, &ClientEvent::ClearAll { room_id: "r1".into() }).await);
    assert_eq!(reply.status, Status::Done);
    assert_eq!(reply.data.get("removed"), Some(&serde_json::json!(2)));

    for conn in [&mut a, &mut b] {
        let frame = recv_broadcast(&mut conn.rx).await;
        assert_eq!(ServerEvent::from_frame(&frame).unwrap(), ServerEvent::Cleared { room_id: "r1".into() });
    }
    assert!(state.store.list_elements("r1").await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_failure_is_reported_and_not_broadcast() {
    let state = test_helpers::test_app_state_with_store(Arc::new(FailingStore::default()));
    let mut a = Conn::new();
    let mut b = Conn::new();
    a.join(&state, "r1").await;
    b.join(&state, "r1").await;

    let reply = single(a.send(&state, &ClientEvent::ClearAll { room_id: "r1".into() }).await);
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_PERSISTENCE_UNAVAILABLE"));
    assert_eq!(reply.data.get(FRAME_RETRYABLE), Some(&serde_json::json!(true)));
    assert_no_broadcast(&mut a.rx).await;
    assert_no_broadcast(&mut b.rx).await;
}

#[tokio::test]
async fn clear_before_join_is_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let reply = single(a.send(&state, &ClientEvent::ClearAll { room_id: "r1".into() }).await);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_NOT_JOINED"));
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn chat_reaches_every_member_including_sender() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let mut b = Conn::new();
    a.join(&state, "r1").await;
    b.join(&state, "r1").await;

    let event = ClientEvent::SendMessage { room_id: "r1".into(), content: "hello".into() };
    let reply = single(a.send(&state, &event).await);
    assert_eq!(reply.status, Status::Done);

    let sender = a.client_id.to_string();
    for conn in [&mut a, &mut b] {
        let frame = recv_broadcast(&mut conn.rx).await;
        let ServerEvent::Message(ChatMessage { content, sender_id, .. }) = ServerEvent::from_frame(&frame).unwrap()
        else {
            panic!("expected chat message");
        };
        assert_eq!(content, "hello");
        assert_eq!(sender_id, sender);
    }
}

#[tokio::test]
async fn chat_before_join_is_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let event = ClientEvent::SendMessage { room_id: "r1".into(), content: "hello".into() };
    let reply = single(a.send(&state, &event).await);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_NOT_JOINED"));
}

// =============================================================================
// Transport parsing
// =============================================================================

#[tokio::test]
async fn binary_frames_are_decoded() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let bytes = frames::encode_frame(&ClientEvent::Join { room_id: "r1".into() }.to_frame());

    let reply = single(process_inbound_bytes(&state, &mut a.room, a.client_id, &a.tx, &bytes).await);
    assert_eq!(reply.status, Status::Done);
    assert_eq!(a.room.as_deref(), Some("r1"));
}

#[tokio::test]
async fn json_text_frames_are_parsed() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let text = serde_json::to_string(&ClientEvent::Join { room_id: "r1".into() }.to_frame()).unwrap();

    let reply = single(process_inbound_text(&state, &mut a.room, a.client_id, &a.tx, &text).await);
    assert_eq!(reply.status, Status::Done);
    assert_eq!(reply.syscall, "room:join");
}

#[tokio::test]
async fn garbage_bytes_yield_gateway_error() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();

    let reply = single(process_inbound_bytes(&state, &mut a.room, a.client_id, &a.tx, &[0xff, 0xff, 0xff]).await);
    assert_eq!(reply.syscall, "gateway:error");
    assert!(reply.data_str(FRAME_MESSAGE).is_some_and(|m| m.starts_with("invalid frame")));
}

#[tokio::test]
async fn invalid_json_yields_gateway_error() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();

    let reply = single(process_inbound_text(&state, &mut a.room, a.client_id, &a.tx, "{not json").await);
    assert_eq!(reply.syscall, "gateway:error");
}

#[tokio::test]
async fn unknown_syscall_is_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let req = Frame::request("board:list", Data::new()).with_room_id("r1");

    let reply = single(process_inbound_frame(&state, &mut a.room, a.client_id, &a.tx, req).await);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_UNEXPECTED_SYSCALL"));
}

#[tokio::test]
async fn non_request_frames_are_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let req = ClientEvent::Join { room_id: "r1".into() }.to_frame().done();

    let reply = single(process_inbound_frame(&state, &mut a.room, a.client_id, &a.tx, req).await);
    assert_eq!(reply.status, Status::Error);
    assert!(a.room.is_none());
}

#[tokio::test]
async fn invalid_room_id_is_rejected() {
    let state = test_helpers::test_app_state();
    let mut a = Conn::new();
    let reply = single(a.send(&state, &ClientEvent::Join { room_id: "has space".into() }).await);
    assert_eq!(reply.data_str(FRAME_CODE), Some("E_INVALID_ROOM"));
}

// =============================================================================
// Outbound
// =============================================================================

#[tokio::test]
async fn send_frames_writes_binary_frames_in_order() {
    let (mut tx, rx) = futures::channel::mpsc::channel::<Message>(8);
    let replies = vec![Frame::request("room:join", Data::new()), Frame::request("room:clear", Data::new())];
    send_frames(&mut tx, &replies).await.unwrap();
    drop(tx);

    let sent: Vec<Message> = futures::StreamExt::collect(rx).await;
    let syscalls: Vec<String> = sent
        .into_iter()
        .map(|msg| match msg {
            Message::Binary(bytes) => frames::decode_frame(&bytes).unwrap().syscall,
            other => panic!("expected binary frame, got {other:?}"),
        })
        .collect();
    assert_eq!(syscalls, ["room:join", "room:clear"]);
}

#[tokio::test]
async fn send_frames_stops_at_first_failed_send() {
    let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = attempts.clone();
    let mut sink = Box::pin(futures::sink::unfold((), move |(), _msg: Message| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 { Ok(()) } else { Err("closed") }
        }
    }));

    let replies: Vec<Frame> = (0..3).map(|_| Frame::request("element:commit", Data::new())).collect();
    assert_eq!(send_frames(&mut sink, &replies).await, Err("closed"));
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
}
