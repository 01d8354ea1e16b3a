//! Frame decoding and per-channel dispatch.
//!
//! Each channel's client events form one tagged union, routed through a
//! single `match`. Handler errors become a `{success: false, error}` ack on
//! the requesting connection; the connection itself stays open.

use tracing::warn;

use crate::call::{lifecycle, signaling};
use crate::chat::{fanout, typing};
use crate::error::GatewayError;
use crate::registry::ConnectionSender;
use crate::state::AppState;
use crate::ws::protocol::{
    self, Ack, CallClientEvent, CallServerEvent, ChatClientEvent, ChatServerEvent, ClientFrame,
};

pub async fn handle_chat_frame(text: &str, tx: &ConnectionSender, state: &AppState, user_id: &str) {
    let frame: ClientFrame<ChatClientEvent> = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "undecodable chat frame");
            let err = GatewayError::BadPayload("unrecognized frame".to_string());
            chat_ack(tx, recover_request_id(text), Err(err));
            return;
        }
    };

    let request_id = frame.id;
    match frame.event {
        ChatClientEvent::MessageSend(payload) => {
            chat_ack(tx, request_id, fanout::handle_send(state, user_id, payload).await);
        }
        ChatClientEvent::MessageEdit(payload) => {
            chat_ack(tx, request_id, fanout::handle_edit(state, user_id, payload).await);
        }
        ChatClientEvent::MessageDelete(payload) => {
            chat_ack(tx, request_id, fanout::handle_delete(state, user_id, payload).await);
        }
        ChatClientEvent::ReactionAdd(payload) => {
            chat_ack(
                tx,
                request_id,
                fanout::handle_reaction_add(state, user_id, payload).await,
            );
        }
        ChatClientEvent::ReactionRemove(payload) => {
            chat_ack(
                tx,
                request_id,
                fanout::handle_reaction_remove(state, user_id, payload).await,
            );
        }
        ChatClientEvent::MessageRead(payload) => {
            chat_ack(tx, request_id, fanout::handle_read(state, user_id, payload).await);
        }
        // Typing signals are fire-and-forget: no persistence, no ack.
        ChatClientEvent::TypingStart(payload) => typing::start(state, user_id, payload),
        ChatClientEvent::TypingStop(payload) => typing::stop(state, user_id, payload),
        ChatClientEvent::ConversationJoin(payload) => {
            state.chat_rooms.join(&payload.conversation_id, user_id);
            chat_ack(tx, request_id, Ok(Ack::ok()));
        }
        ChatClientEvent::ConversationLeave(payload) => {
            state.chat_rooms.leave(&payload.conversation_id, user_id);
            chat_ack(tx, request_id, Ok(Ack::ok()));
        }
    }
}

pub async fn handle_call_frame(text: &str, tx: &ConnectionSender, state: &AppState, user_id: &str) {
    let frame: ClientFrame<CallClientEvent> = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "undecodable call frame");
            let err = GatewayError::BadPayload("unrecognized frame".to_string());
            call_ack(tx, recover_request_id(text), Err(err));
            return;
        }
    };

    let request_id = frame.id;
    match frame.event {
        CallClientEvent::Initiate(payload) => {
            call_ack(
                tx,
                request_id,
                lifecycle::handle_initiate(state, user_id, payload).await,
            );
        }
        CallClientEvent::Answer(payload) => {
            call_ack(
                tx,
                request_id,
                lifecycle::handle_answer(state, user_id, payload).await,
            );
        }
        CallClientEvent::Reject(payload) => {
            call_ack(
                tx,
                request_id,
                lifecycle::handle_reject(state, user_id, payload).await,
            );
        }
        CallClientEvent::End(payload) => {
            call_ack(
                tx,
                request_id,
                lifecycle::handle_end(state, user_id, payload).await,
            );
        }
        // Signaling frames and toggles are relayed without acknowledgement.
        CallClientEvent::Offer(payload) => signaling::relay_offer(state, user_id, payload),
        CallClientEvent::SdpAnswer(payload) => signaling::relay_answer(state, user_id, payload),
        CallClientEvent::IceCandidate(payload) => {
            signaling::relay_ice_candidate(state, user_id, payload)
        }
        CallClientEvent::ToggleAudio(payload) => {
            signaling::broadcast_audio_toggle(state, user_id, payload)
        }
        CallClientEvent::ToggleVideo(payload) => {
            signaling::broadcast_video_toggle(state, user_id, payload)
        }
    }
}

fn chat_ack(tx: &ConnectionSender, request_id: Option<String>, result: Result<Ack, GatewayError>) {
    let ack = match result {
        Ok(ack) => ack,
        Err(e) => {
            warn!(error = %e, "chat request failed");
            Ack::err(&e)
        }
    };
    if let Some(msg) = protocol::encode(request_id, &ChatServerEvent::Ack(ack)) {
        let _ = tx.send(msg);
    }
}

fn call_ack(tx: &ConnectionSender, request_id: Option<String>, result: Result<Ack, GatewayError>) {
    let ack = match result {
        Ok(ack) => ack,
        Err(e) => {
            warn!(error = %e, "call request failed");
            Ack::err(&e)
        }
    };
    if let Some(msg) = protocol::encode(request_id, &CallServerEvent::Ack(ack)) {
        let _ = tx.send(msg);
    }
}

/// Best-effort request id recovery from a frame that failed to decode, so
/// the error ack can still be correlated.
fn recover_request_id(text: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("id")?.as_str().map(String::from))
}
