use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::call::lifecycle;
use crate::presence;
use crate::state::AppState;
use crate::ws::{dispatch, Channel};

/// Ping interval: server sends a WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader task: decodes incoming frames, dispatches to the channel's
///   handlers
///
/// The mpsc channel allows any part of the system to push frames to this
/// client by cloning the sender held in the connection registry.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: String, channel: Channel) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let (registry, rooms) = match channel {
        Channel::Chat => (&state.chat_connections, &state.chat_rooms),
        Channel::Calls => (&state.call_connections, &state.call_rooms),
    };
    let connection_id = registry.register(&user_id, tx.clone());

    // Subscribe to a room per conversation the user belongs to. A directory
    // failure leaves the connection usable; explicit joins still work.
    match state
        .collab
        .conversations
        .conversations_for_user(&user_id)
        .await
    {
        Ok(conversations) => {
            for conversation in &conversations {
                rooms.join(&conversation.id, &user_id);
            }
        }
        Err(e) => {
            warn!(
                user_id = %user_id,
                error = %e,
                "conversation membership load failed"
            );
        }
    }

    match channel {
        Channel::Chat => {
            presence::publish_online(&state.presence, &state.chat_connections, &user_id);
        }
        Channel::Calls => {
            // Covers a callee whose client dropped and reconnected while a
            // call was still waiting to be answered.
            lifecycle::redeliver_ringing(&state, &user_id);
        }
    }

    info!(user_id = %user_id, channel = ?channel, "WebSocket actor started");

    // Writer task: forwards mpsc frames to the WebSocket sink.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Ping task: periodic pings, close on missed pong.
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: decode and dispatch incoming frames.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => match channel {
                    Channel::Chat => {
                        dispatch::handle_chat_frame(text.as_str(), &tx, &state, &user_id).await;
                    }
                    Channel::Calls => {
                        dispatch::handle_call_frame(text.as_str(), &tx, &state, &user_id).await;
                    }
                },
                Message::Binary(_) => {
                    debug!(user_id = %user_id, "binary frame ignored (protocol is JSON text)");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    info!(user_id = %user_id, reason = ?frame, "client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                warn!(user_id = %user_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    ping_handle.abort();

    // Disconnect side effects run only when this actor still owns the
    // registry mapping: a replacement connection (last-writer-wins) must not
    // be torn down by its predecessor's cleanup.
    if registry.unregister(&user_id, connection_id) {
        rooms.leave_all(&user_id);
        match channel {
            Channel::Chat => {
                presence::publish_offline(&state.presence, &state.chat_connections, &user_id);
            }
            Channel::Calls => {
                lifecycle::handle_disconnect(&state, &user_id).await;
            }
        }
    }

    info!(user_id = %user_id, channel = ?channel, "WebSocket actor stopped");
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
