//! Integration tests for the messaging channel: fan-out, acks, pushes,
//! mentions, typing, presence, and silent auth failure.

mod common;

use futures_util::StreamExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use common::*;
use quckapp_gateway::clients::{PushKind, UserStatus};

#[tokio::test]
async fn send_broadcasts_to_room_then_acks_sender() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "hello there" }),
    )
    .await;

    let broadcast = wait_for_event(&mut ws2, "message:new").await;
    assert_eq!(broadcast["data"]["message"]["content"], "hello there");
    assert_eq!(broadcast["data"]["message"]["sender_id"], "u1");
    assert_eq!(broadcast["data"]["sender"]["display_name"], "Ann");

    // Sender sees the room broadcast too, then the ack with the message.
    let own_copy = wait_for_event(&mut ws1, "message:new").await;
    assert_eq!(own_copy["data"]["message"]["content"], "hello there");
    let ack = wait_for_event(&mut ws1, "ack").await;
    assert_eq!(ack["id"], "req-1");
    assert_eq!(ack["data"]["success"], true);
    assert_eq!(ack["data"]["message"]["conversation_id"], "c1");
}

#[tokio::test]
async fn sends_from_one_connection_arrive_in_submission_order() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    // Submit back-to-back without waiting for acks.
    for n in 1..=3 {
        send_event(
            &mut ws1,
            Some(&format!("req-{}", n)),
            "message:send",
            json!({ "conversation_id": "c1", "content": format!("msg {}", n) }),
        )
        .await;
    }

    for n in 1..=3 {
        let frame = wait_for_event(&mut ws2, "message:new").await;
        assert_eq!(frame["data"]["message"]["content"], format!("msg {}", n));
    }
}

#[tokio::test]
async fn offline_recipient_gets_push_and_unread_bump() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles
        .users
        .insert(profile("u2", "Ben", UserStatus::Offline, &["tok-u2"]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "you there?" }),
    )
    .await;
    wait_for_event(&mut ws1, "ack").await;

    eventually(
        || !handles.push.sent().is_empty(),
        "offline recipient push dispatched",
    )
    .await;
    let sent = handles.push.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "tok-u2");
    assert_eq!(sent[0].1.kind, PushKind::Message);
    // Direct conversation: title is the sender's display name.
    assert_eq!(sent[0].1.title, "Ann");

    eventually(
        || handles.conversations.unread_count("c1", "u2") == 1,
        "unread counter incremented",
    )
    .await;
    assert_eq!(handles.conversations.unread_count("c1", "u1"), 0);
}

#[tokio::test]
async fn mentioned_offline_user_gets_exactly_one_mention_push() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .users
        .insert(profile("u3", "Jane", UserStatus::Offline, &["tok-u3"]));
    handles
        .conversations
        .insert(conversation("c1", true, &["u1", "u2", "u3"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let _ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "ping @[Jane](u3)" }),
    )
    .await;
    wait_for_event(&mut ws1, "ack").await;

    eventually(
        || !handles.push.sent().is_empty(),
        "mention push dispatched",
    )
    .await;
    // Give the follow-up task a beat to finish everything it would send.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let to_u3: Vec<_> = handles
        .push
        .sent()
        .into_iter()
        .filter(|(token, _)| token == "tok-u3")
        .collect();
    assert_eq!(to_u3.len(), 1, "u3 must get exactly one push");
    assert_eq!(to_u3[0].1.kind, PushKind::Mention);
    assert_eq!(to_u3[0].1.title, "Ann mentioned you");
}

#[tokio::test]
async fn read_receipt_is_idempotent_across_redelivery() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "read me" }),
    )
    .await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    let message_id = ack["data"]["message"]["id"].as_str().unwrap().to_string();

    for n in 0..2 {
        send_event(
            &mut ws2,
            Some(&format!("read-{}", n)),
            "message:read",
            json!({ "message_id": message_id, "conversation_id": "c1" }),
        )
        .await;
        let ack = wait_for_event(&mut ws2, "ack").await;
        assert_eq!(ack["data"]["success"], true);
    }

    let stored = handles.messages.fetch(&message_id).unwrap();
    assert_eq!(stored.read_by, vec!["u2".to_string()]);
}

#[tokio::test]
async fn edit_without_conversation_hint_derives_room_from_message() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "tpyo" }),
    )
    .await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    let message_id = ack["data"]["message"]["id"].as_str().unwrap().to_string();

    send_event(
        &mut ws1,
        Some("req-2"),
        "message:edited",
        json!({ "message_id": message_id, "content": "typo" }),
    )
    .await;

    let edited = wait_for_event(&mut ws2, "message:edited").await;
    assert_eq!(edited["data"]["conversation_id"], "c1");
    assert_eq!(edited["data"]["message"]["content"], "typo");
}

#[tokio::test]
async fn delete_broadcasts_and_removes_message() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "oops" }),
    )
    .await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    let message_id = ack["data"]["message"]["id"].as_str().unwrap().to_string();

    // No conversation hint: the room is derived from the deleted record.
    send_event(
        &mut ws1,
        Some("req-2"),
        "message:deleted",
        json!({ "message_id": message_id }),
    )
    .await;

    let deleted = wait_for_event(&mut ws2, "message:deleted").await;
    assert_eq!(deleted["data"]["conversation_id"], "c1");
    assert_eq!(deleted["data"]["message_id"], message_id.as_str());
    assert!(handles.messages.fetch(&message_id).is_none());
}

#[tokio::test]
async fn reaction_add_and_remove_broadcast_typed_events() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        Some("req-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "react to me" }),
    )
    .await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    let message_id = ack["data"]["message"]["id"].as_str().unwrap().to_string();

    send_event(
        &mut ws2,
        Some("r-add"),
        "message:reaction:add",
        json!({ "message_id": message_id, "emoji": "👍", "conversation_id": "c1" }),
    )
    .await;
    let added = wait_for_event(&mut ws1, "message:reaction:added").await;
    assert_eq!(added["data"]["emoji"], "👍");
    assert_eq!(added["data"]["user_id"], "u2");

    send_event(
        &mut ws2,
        Some("r-del"),
        "message:reaction:remove",
        json!({ "message_id": message_id, "emoji": "👍", "conversation_id": "c1" }),
    )
    .await;
    let removed = wait_for_event(&mut ws1, "message:reaction:removed").await;
    assert_eq!(removed["data"]["emoji"], "👍");

    let stored = handles.messages.fetch(&message_id).unwrap();
    assert!(stored.reactions.is_empty());
}

#[tokio::test]
async fn typing_relays_to_room_excluding_sender() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1", "u2"]));

    let mut ws1 = connect_chat(addr, "u1").await;
    let mut ws2 = connect_chat(addr, "u2").await;

    send_event(
        &mut ws1,
        None,
        "typing:start",
        json!({ "conversation_id": "c1" }),
    )
    .await;

    let typing = wait_for_event(&mut ws2, "typing:start").await;
    assert_eq!(typing["data"]["user_id"], "u1");

    // No ack, and no echo back to the sender.
    assert_no_event(&mut ws1, "typing:start").await;
    assert_no_event(&mut ws1, "ack").await;
}

#[tokio::test]
async fn presence_transitions_broadcast_globally() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles.users.insert(profile("u2", "Ben", UserStatus::Online, &[]));
    // No shared conversation: presence is global, not room-scoped.
    let mut ws1 = connect_chat(addr, "u1").await;
    // A client's own transition is broadcast to it as well; drain it first.
    let own = wait_for_event(&mut ws1, "user:online").await;
    assert_eq!(own["data"]["user_id"], "u1");

    let ws2 = connect_chat(addr, "u2").await;
    let online = wait_for_event(&mut ws1, "user:online").await;
    assert_eq!(online["data"]["user_id"], "u2");

    drop(ws2);
    let offline = wait_for_event(&mut ws1, "user:offline").await;
    assert_eq!(offline["data"]["user_id"], "u2");
    assert!(offline["data"]["last_seen"].is_string());
}

#[tokio::test]
async fn invalid_token_closes_socket_without_error_event() {
    let (addr, _handles, _state) = start_server().await;

    let mut ws = connect(addr, "chat", "not-a-jwt").await;

    // The server must not emit any frame; the socket just closes.
    let next = tokio::time::timeout(std::time::Duration::from_secs(2), ws.next())
        .await
        .expect("socket should close promptly");
    match next {
        None => {}
        Some(Ok(Message::Close(_))) => {}
        Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected silent close, got {:?}", other),
    }
}

#[tokio::test]
async fn bad_payload_yields_error_ack_and_connection_survives() {
    let (addr, handles, _state) = start_server().await;
    handles.users.insert(profile("u1", "Ann", UserStatus::Online, &[]));
    handles
        .conversations
        .insert(conversation("c1", false, &["u1"]));

    let mut ws1 = connect_chat(addr, "u1").await;

    // Unknown event name.
    send_event(&mut ws1, Some("bad-1"), "message:zap", json!({})).await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    assert_eq!(ack["id"], "bad-1");
    assert_eq!(ack["data"]["success"], false);
    assert!(ack["data"]["error"].is_string());

    // Empty message: handler-level validation error.
    send_event(
        &mut ws1,
        Some("bad-2"),
        "message:send",
        json!({ "conversation_id": "c1" }),
    )
    .await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    assert_eq!(ack["data"]["success"], false);

    // The connection stays open and usable.
    send_event(
        &mut ws1,
        Some("ok-1"),
        "message:send",
        json!({ "conversation_id": "c1", "content": "still alive" }),
    )
    .await;
    let ack = wait_for_event(&mut ws1, "ack").await;
    assert_eq!(ack["data"]["success"], true);
}

#[tokio::test]
async fn healthz_reports_service_and_version() {
    let (addr, _handles, _state) = start_server().await;
    let body: serde_json::Value = reqwest::get(format!("http://{}/healthz", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["service"], "quckapp-gateway");
    assert_eq!(body["status"], "ok");
}
