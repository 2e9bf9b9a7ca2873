mod common;

use std::sync::Arc;
use std::time::Duration;

use chat_api::db::store::MemoryMessageStore;
use chat_api::models::message::{RoomId, UserId};
use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

async fn send(ws: &mut common::WsClient, frame: serde_json::Value) {
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Read the next text frame, skipping control frames.
async fn recv(ws: &mut common::WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => return serde_json::from_str(&text).expect("parse frame"),
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("expected text frame, got: {other:?}"),
        }
    }
}

/// Assert nothing but control frames arrive within `wait`.
async fn assert_silent(ws: &mut common::WsClient, wait: Duration) {
    if let Ok(Some(Ok(msg))) = time::timeout(wait, ws.next()).await {
        assert!(!msg.is_text(), "unexpected frame: {msg:?}");
    }
}

async fn wait_for_members(state: &chat_api::AppState, room: Option<RoomId>, count: usize) {
    let hub = state.hubs.hub(room).unwrap();
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while hub.member_count().await.unwrap() != count {
        assert!(time::Instant::now() < deadline, "hub never reached {count} members");
        time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn room_broadcast_reaches_other_members_and_is_persisted() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut c1 = common::connect(addr, "/rooms/1/ws").await;
    let mut c2 = common::connect(addr, "/rooms/1/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 2).await;

    send(&mut c1, serde_json::json!({ "sender": 11, "message": "hi" })).await;

    let frame = recv(&mut c2).await;
    assert_eq!(frame["sender"], 11);
    assert_eq!(frame["message"], "hi");
    assert_eq!(frame["room_id"], 1);
    assert!(frame["receiver"].is_null());
    assert_silent(&mut c1, Duration::from_millis(200)).await;

    common::eventually(|| store.len() == 1).await;
    let stored = &store.messages()[0];
    assert_eq!(stored.room_id(), Some(RoomId(1)));
    assert_eq!(stored.sender(), UserId(11));
    assert_eq!(stored.receiver(), None);
}

#[tokio::test]
async fn lone_member_message_is_still_persisted() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut c1 = common::connect(addr, "/rooms/2/ws").await;
    wait_for_members(&state, Some(RoomId(2)), 1).await;

    send(&mut c1, serde_json::json!({ "sender": 11, "message": "anyone?" })).await;

    common::eventually(|| store.len() == 1).await;
    assert_eq!(store.messages()[0].room_id(), Some(RoomId(2)));
    assert_silent(&mut c1, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn rooms_do_not_leak_into_each_other() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut a1 = common::connect(addr, "/rooms/1/ws").await;
    let mut a2 = common::connect(addr, "/rooms/1/ws").await;
    let mut b1 = common::connect(addr, "/rooms/2/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 2).await;
    wait_for_members(&state, Some(RoomId(2)), 1).await;

    send(&mut a1, serde_json::json!({ "sender": 1, "message": "room one only" })).await;

    assert_eq!(recv(&mut a2).await["message"], "room one only");
    assert_silent(&mut b1, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn direct_messages_go_through_the_global_hub() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut c1 = common::connect(addr, "/ws").await;
    let mut c2 = common::connect(addr, "/ws").await;
    wait_for_members(&state, None, 2).await;

    send(&mut c1, serde_json::json!({ "sender": 1, "receiver": 2, "message": "psst" })).await;

    let frame = recv(&mut c2).await;
    assert_eq!(frame["receiver"], 2);
    assert!(frame["room_id"].is_null());

    common::eventually(|| store.len() == 1).await;
    assert_eq!(store.messages()[0].receiver(), Some(UserId(2)));
}

#[tokio::test]
async fn unknown_room_is_rejected_before_upgrade() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, _state) = common::start_server(store).await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/rooms/999/ws"))
        .await
        .expect_err("upgrade should fail");

    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 404),
        other => panic!("expected HTTP error, got: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_frame_closes_only_the_sender() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut bad = common::connect(addr, "/rooms/1/ws").await;
    let mut good = common::connect(addr, "/rooms/1/ws").await;
    let mut other = common::connect(addr, "/rooms/1/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 3).await;

    bad.send(tungstenite::Message::Text("not json".into()))
        .await
        .expect("send");

    let msg = time::timeout(Duration::from_secs(5), bad.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");
    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(frame.code, tungstenite::protocol::frame::coding::CloseCode::from(1007));
        }
        other => panic!("Expected Close frame, got: {other:?}"),
    }
    wait_for_members(&state, Some(RoomId(1)), 2).await;

    send(&mut good, serde_json::json!({ "sender": 2, "message": "still here" })).await;
    assert_eq!(recv(&mut other).await["message"], "still here");
}

#[tokio::test]
async fn oversized_frame_is_rejected_as_invalid_payload() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut big = common::connect(addr, "/rooms/1/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 1).await;

    let text = "x".repeat(state.config.connection.max_frame_bytes);
    send(&mut big, serde_json::json!({ "sender": 1, "message": text })).await;

    let msg = time::timeout(Duration::from_secs(5), big.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");
    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(frame.code, tungstenite::protocol::frame::coding::CloseCode::from(1007));
        }
        other => panic!("Expected Close frame, got: {other:?}"),
    }
    wait_for_members(&state, Some(RoomId(1)), 0).await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn failing_storage_does_not_affect_delivery() {
    let store = Arc::new(MemoryMessageStore::failing());
    let (addr, state) = common::start_server(store.clone()).await;

    let mut c1 = common::connect(addr, "/rooms/1/ws").await;
    let mut c2 = common::connect(addr, "/rooms/1/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 2).await;

    for text in ["one", "two", "three"] {
        send(&mut c1, serde_json::json!({ "sender": 1, "message": text })).await;
    }
    for text in ["one", "two", "three"] {
        assert_eq!(recv(&mut c2).await["message"], text);
    }

    let stats = state.persistence.stats();
    common::eventually(|| stats.snapshot().failed == 3).await;
    assert!(store.is_empty());
    assert_eq!(state.hubs.hub(Some(RoomId(1))).unwrap().member_count().await.unwrap(), 2);
}

#[tokio::test]
async fn client_disconnect_unregisters() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store).await;

    let mut c1 = common::connect(addr, "/rooms/1/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 1).await;

    c1.close(None).await.expect("close");
    wait_for_members(&state, Some(RoomId(1)), 0).await;
}

#[tokio::test]
async fn shutdown_closes_open_sockets() {
    let store = Arc::new(MemoryMessageStore::new());
    let (addr, state) = common::start_server(store).await;

    let mut c1 = common::connect(addr, "/rooms/1/ws").await;
    let mut c2 = common::connect(addr, "/ws").await;
    wait_for_members(&state, Some(RoomId(1)), 1).await;
    wait_for_members(&state, None, 1).await;

    assert_eq!(state.hubs.shutdown().await, 2);

    for ws in [&mut c1, &mut c2] {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout")
            .expect("stream ended")
            .expect("read error");
        assert!(msg.is_close(), "expected close, got {msg:?}");
    }
}
