use super::*;
use frames::{Point, Shape};

fn stroke(x: f64) -> Element {
    Element::new(Shape::Path { points: vec![Point::new(x, 0.0), Point::new(x, 10.0)] }, "#000000", 3.0)
}

fn message(room_id: &str, content: &str, created_at: i64) -> ChatMessage {
    ChatMessage { room_id: room_id.into(), sender_id: "peer".into(), content: content.into(), created_at }
}

// =============================================================================
// Elements
// =============================================================================

#[tokio::test]
async fn unknown_room_lists_empty() {
    let store = MemoryRoomStore::new();
    assert!(store.list_elements("nobody-here").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_preserves_insertion_order() {
    let store = MemoryRoomStore::new();
    let (a, b, c) = (stroke(1.0), stroke(2.0), stroke(3.0));
    store.append_element("r1", &a).await.unwrap();
    store.append_elements("r1", &[b.clone(), c.clone()]).await.unwrap();

    let listed = store.list_elements("r1").await.unwrap();
    assert_eq!(listed, vec![a, b, c]);
}

#[tokio::test]
async fn duplicate_ids_are_appended_once() {
    let store = MemoryRoomStore::new();
    let a = stroke(1.0);
    store.append_element("r1", &a).await.unwrap();
    store.append_element("r1", &a).await.unwrap();
    store.append_elements("r1", &[a.clone()]).await.unwrap();

    assert_eq!(store.list_elements("r1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn rooms_are_isolated() {
    let store = MemoryRoomStore::new();
    store.append_element("r1", &stroke(1.0)).await.unwrap();
    store.append_element("r2", &stroke(2.0)).await.unwrap();

    assert_eq!(store.clear_all("r1").await.unwrap(), 1);
    assert!(store.list_elements("r1").await.unwrap().is_empty());
    assert_eq!(store.list_elements("r2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn clear_unknown_room_removes_nothing() {
    let store = MemoryRoomStore::new();
    assert_eq!(store.clear_all("ghost").await.unwrap(), 0);
}

#[tokio::test]
async fn clear_keeps_chat_history() {
    let store = MemoryRoomStore::new();
    store.append_element("r1", &stroke(1.0)).await.unwrap();
    store.append_message(&message("r1", "hi", 1)).await.unwrap();
    store.clear_all("r1").await.unwrap();

    assert_eq!(store.list_messages("r1", 50).await.unwrap().len(), 1);
}

// =============================================================================
// Messages
// =============================================================================

#[tokio::test]
async fn messages_are_oldest_first_and_limited() {
    let store = MemoryRoomStore::new();
    store.append_message(&message("r1", "third", 30)).await.unwrap();
    store.append_message(&message("r1", "first", 10)).await.unwrap();
    store.append_message(&message("r1", "second", 20)).await.unwrap();
    store.append_message(&message("r2", "elsewhere", 5)).await.unwrap();

    let all = store.list_messages("r1", 50).await.unwrap();
    let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["first", "second", "third"]);

    let limited = store.list_messages("r1", 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].content, "first");
}

#[tokio::test]
async fn equal_timestamps_keep_arrival_order() {
    let store = MemoryRoomStore::new();
    store.append_message(&message("r1", "a", 7)).await.unwrap();
    store.append_message(&message("r1", "b", 7)).await.unwrap();

    let listed = store.list_messages("r1", 10).await.unwrap();
    assert_eq!(listed[0].content, "a");
    assert_eq!(listed[1].content, "b");
}
