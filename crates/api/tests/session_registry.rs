//! Unit tests for `SessionRegistry`.
//!
//! These tests exercise the session registry directly, without
//! performing any HTTP upgrades. They verify register/unregister
//! semantics, eviction on reconnect, generation-checked cleanup, and
//! broadcast delivery.

use axum::extract::ws::Message;
use serde_json::json;

use easel_api::ws::SessionRegistry;

// ---------------------------------------------------------------------------
// Test: registration assigns or honours the session id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_generates_id_when_none_requested() {
    let registry = SessionRegistry::new();

    let reg = registry.register(None).await;
    assert!(!reg.session_id.is_empty());
    assert_eq!(registry.session_count().await, 1);
}

#[tokio::test]
async fn register_honours_requested_id() {
    let registry = SessionRegistry::new();

    let reg = registry.register(Some("sid-1".to_string())).await;
    assert_eq!(reg.session_id, "sid-1");
}

#[tokio::test]
async fn empty_requested_id_gets_a_generated_one() {
    let registry = SessionRegistry::new();

    let reg = registry.register(Some(String::new())).await;
    assert!(!reg.session_id.is_empty());
}

// ---------------------------------------------------------------------------
// Test: reconnect with the same id evicts the previous channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_evicts_previous_holder() {
    let registry = SessionRegistry::new();

    let mut old = registry.register(Some("sid-1".to_string())).await;
    let mut new = registry.register(Some("sid-1".to_string())).await;
    assert_eq!(registry.session_count().await, 1);

    // The evicted channel gets a Close frame.
    let msg = old.receiver.recv().await.expect("old channel gets Close");
    assert!(matches!(msg, Message::Close(None)));

    // Events now reach the new channel only.
    assert!(registry.send_json("sid-1", &json!({"k": "v"})).await);
    let msg = new.receiver.recv().await.expect("new channel gets event");
    assert!(matches!(&msg, Message::Text(t) if t.contains("\"k\"")));
    assert!(old.receiver.recv().await.is_none());
}

// ---------------------------------------------------------------------------
// Test: stale cleanup cannot remove a replacement channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_unregister_keeps_replacement_channel() {
    let registry = SessionRegistry::new();

    let old = registry.register(Some("sid-1".to_string())).await;
    let _new = registry.register(Some("sid-1".to_string())).await;

    // The evicted connection's cleanup runs late, with its stale
    // generation.
    registry.unregister("sid-1", old.generation).await;
    assert_eq!(registry.session_count().await, 1);
    assert!(registry.send_json("sid-1", &json!({"still": "here"})).await);
}

#[tokio::test]
async fn matching_unregister_removes_the_session() {
    let registry = SessionRegistry::new();

    let reg = registry.register(Some("sid-1".to_string())).await;
    registry.unregister("sid-1", reg.generation).await;

    assert_eq!(registry.session_count().await, 0);
    assert!(!registry.send_json("sid-1", &json!({})).await);
}

// ---------------------------------------------------------------------------
// Test: sends to missing or closed sessions are swallowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_missing_session_is_dropped() {
    let registry = SessionRegistry::new();

    assert!(!registry.send_json("ghost", &json!({"x": 1})).await);
}

#[tokio::test]
async fn send_to_closed_channel_is_dropped() {
    let registry = SessionRegistry::new();

    let reg = registry.register(Some("sid-1".to_string())).await;
    drop(reg.receiver);

    assert!(!registry.send_json("sid-1", &json!({"x": 1})).await);
}

// ---------------------------------------------------------------------------
// Test: broadcast reaches all live sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_all_sessions() {
    let registry = SessionRegistry::new();

    let mut a = registry.register(Some("a".to_string())).await;
    let mut b = registry.register(Some("b".to_string())).await;

    registry.broadcast_json(&json!({"type": "status"})).await;

    for rx in [&mut a.receiver, &mut b.receiver] {
        let msg = rx.recv().await.expect("broadcast delivered");
        assert!(matches!(&msg, Message::Text(t) if t.contains("status")));
    }
}

// ---------------------------------------------------------------------------
// Test: binary frames carry the big-endian tag prefix
// ---------------------------------------------------------------------------

#[tokio::test]
async fn binary_send_prefixes_frame_tag() {
    let registry = SessionRegistry::new();

    let mut reg = registry.register(Some("sid-1".to_string())).await;
    assert!(registry.send_binary("sid-1", 1, b"jpeg-bytes").await);

    let msg = reg.receiver.recv().await.expect("binary delivered");
    match msg {
        Message::Binary(frame) => {
            assert_eq!(&frame[..4], &[0, 0, 0, 1]);
            assert_eq!(&frame[4..], b"jpeg-bytes");
        }
        other => panic!("Expected Binary, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let registry = SessionRegistry::new();

    let mut a = registry.register(Some("a".to_string())).await;
    let mut b = registry.register(Some("b".to_string())).await;
    assert_eq!(registry.session_count().await, 2);

    registry.shutdown_all().await;
    assert_eq!(registry.session_count().await, 0);

    for rx in [&mut a.receiver, &mut b.receiver] {
        let msg = rx.recv().await.expect("Close delivered");
        assert!(matches!(msg, Message::Close(None)));
        assert!(rx.recv().await.is_none());
    }
}
