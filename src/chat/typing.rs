//! Typing indicator relay: ephemeral, unpersisted, no acknowledgement.

use crate::state::AppState;
use crate::ws::protocol::{self, ChatServerEvent, ConversationRefPayload};

pub fn start(state: &AppState, user_id: &str, payload: ConversationRefPayload) {
    relay(
        state,
        &payload.conversation_id,
        user_id,
        ChatServerEvent::TypingStart {
            conversation_id: payload.conversation_id.clone(),
            user_id: user_id.to_string(),
        },
    );
}

pub fn stop(state: &AppState, user_id: &str, payload: ConversationRefPayload) {
    relay(
        state,
        &payload.conversation_id,
        user_id,
        ChatServerEvent::TypingStop {
            conversation_id: payload.conversation_id.clone(),
            user_id: user_id.to_string(),
        },
    );
}

fn relay(state: &AppState, conversation_id: &str, sender: &str, event: ChatServerEvent) {
    if let Some(msg) = protocol::encode(None, &event) {
        state
            .chat_rooms
            .broadcast(&state.chat_connections, conversation_id, msg, Some(sender));
    }
}
