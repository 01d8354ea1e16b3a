//! Shared fixtures for gateway integration tests: an in-process server over
//! in-memory collaborators, token minting, and WebSocket client helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use quckapp_gateway::auth::Claims;
use quckapp_gateway::clients::memory::{memory_collaborators, MemoryHandles};
use quckapp_gateway::clients::{Conversation, UserProfile, UserStatus};
use quckapp_gateway::config::IceConfig;
use quckapp_gateway::routes;
use quckapp_gateway::state::AppState;

pub const TEST_SECRET: &[u8] = b"integration-test-secret";

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the gateway on a random port with in-memory collaborators.
pub async fn start_server() -> (SocketAddr, MemoryHandles, AppState) {
    let (collab, handles) = memory_collaborators();
    let state = AppState::new(
        TEST_SECRET.to_vec(),
        IceConfig::default(),
        Duration::from_secs(2),
        collab,
    );
    let app = routes::build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, handles, state)
}

pub fn mint_token(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

pub async fn connect_chat(addr: SocketAddr, user_id: &str) -> WsClient {
    connect(addr, "chat", &mint_token(user_id)).await
}

pub async fn connect_calls(addr: SocketAddr, user_id: &str) -> WsClient {
    connect(addr, "calls", &mint_token(user_id)).await
}

pub async fn connect(addr: SocketAddr, namespace: &str, token: &str) -> WsClient {
    let url = format!("ws://{}/ws/{}?token={}", addr, namespace, token);
    let (ws, _) = connect_async(url).await.expect("WebSocket connect failed");
    ws
}

/// Send a `{"id", "event", "data"}` frame.
pub async fn send_event(ws: &mut WsClient, id: Option<&str>, event: &str, data: Value) {
    let mut frame = serde_json::json!({ "event": event, "data": data });
    if let Some(id) = id {
        frame["id"] = Value::String(id.to_string());
    }
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("WebSocket send failed");
}

/// Receive the next JSON frame, skipping control frames. `None` on timeout
/// or close.
pub async fn recv_frame(ws: &mut WsClient) -> Option<Value> {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .ok()??;
        match next.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Read frames until one matches `event`, skipping everything else.
pub async fn wait_for_event(ws: &mut WsClient, event: &str) -> Value {
    for _ in 0..20 {
        match recv_frame(ws).await {
            Some(frame) if frame["event"] == event => return frame,
            Some(_) => continue,
            None => break,
        }
    }
    panic!("did not receive event {:?}", event);
}

/// Assert no frame with the given event arrives within a short window.
pub async fn assert_no_event(ws: &mut WsClient, event: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(300);
    while tokio::time::Instant::now() < deadline {
        let next = match tokio::time::timeout(Duration::from_millis(100), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(_))) => continue,
            _ => continue,
        };
        if let Ok(frame) = serde_json::from_str::<Value>(next.as_str()) {
            assert_ne!(frame["event"], event, "unexpected {:?} frame", event);
        }
    }
}

/// Poll until `check` passes; async side effects (spawned follow-ups,
/// disconnect cleanup) need a moment to land.
pub async fn eventually(check: impl Fn() -> bool, what: &str) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached: {}", what);
}

pub fn profile(id: &str, name: &str, status: UserStatus, tokens: &[&str]) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        display_name: name.to_string(),
        avatar_url: None,
        status,
        device_tokens: tokens.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn conversation(id: &str, is_group: bool, participants: &[&str]) -> Conversation {
    Conversation {
        id: id.to_string(),
        name: if is_group {
            Some(format!("{} group", id))
        } else {
            None
        },
        is_group,
        participant_ids: participants.iter().map(|p| p.to_string()).collect(),
    }
}
