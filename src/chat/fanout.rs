//! Message fan-out engine.
//!
//! `send` persists through the message store, broadcasts to the
//! conversation's room before acknowledging, then runs its follow-ups
//! (unread counters, offline pushes, mention pushes) off the request path.
//! Follow-up failures are logged and swallowed; they never fail the send.
//!
//! Every other operation (edit, delete, reactions, read) persists first and
//! then broadcasts a typed event to the room. The room id is taken from the
//! caller-supplied `conversation_id` when present (saves a lookup) and is
//! otherwise derived from the message record.

use serde_json::json;
use tracing::warn;

use crate::chat::mentions;
use crate::clients::{
    Conversation, Message, MessageDraft, PushKind, PushNotification, UserProfile,
};
use crate::error::GatewayError;
use crate::notify;
use crate::state::AppState;
use crate::ws::protocol::{
    self, Ack, ChatServerEvent, EditMessagePayload, MessageRefPayload, ReactionPayload,
    SendMessagePayload, UserSummary,
};

/// Push notification body preview cap.
const PREVIEW_LENGTH: usize = 140;

pub async fn handle_send(
    state: &AppState,
    user_id: &str,
    payload: SendMessagePayload,
) -> Result<Ack, GatewayError> {
    if payload.content.as_deref().map_or(true, str::is_empty) && payload.attachments.is_empty() {
        return Err(GatewayError::BadPayload(
            "message needs content or attachments".to_string(),
        ));
    }

    let created = state
        .collab
        .messages
        .create_message(&MessageDraft {
            conversation_id: payload.conversation_id.clone(),
            sender_id: user_id.to_string(),
            message_type: payload.message_type,
            content: payload.content.clone(),
            attachments: payload.attachments.clone(),
            reply_to_id: payload.reply_to_id.clone(),
            forwarded_from_id: payload.forwarded_from_id.clone(),
        })
        .await?;

    // Populated message, conversation record, and sender profile in parallel.
    let (message, conversation, sender) = tokio::join!(
        state.collab.messages.fetch_message(&created.id),
        state
            .collab
            .conversations
            .fetch_conversation(&payload.conversation_id),
        state.collab.users.fetch_user(user_id),
    );
    let (message, conversation, sender) = (message?, conversation?, sender?);

    // The sender's ack waits for this broadcast.
    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::MessageNew {
            message: message.clone(),
            conversation: conversation.clone(),
            sender: UserSummary::from(&sender),
        },
    ) {
        state.chat_rooms.broadcast(
            &state.chat_connections,
            &payload.conversation_id,
            msg,
            None,
        );
    }

    spawn_followups(state.clone(), message.clone(), conversation, sender);

    Ok(Ack::ok_with(json!({ "message": message })))
}

/// Post-ack follow-ups: unread counters, offline-recipient pushes, mention
/// pushes. A user gets at most one push per message; the mention push takes
/// precedence over the generic offline one.
fn spawn_followups(
    state: AppState,
    message: Message,
    conversation: Conversation,
    sender: UserProfile,
) {
    tokio::spawn(async move {
        if let Err(e) = state
            .collab
            .conversations
            .increment_unread(&conversation.id, &sender.id)
            .await
        {
            warn!(
                conversation_id = %conversation.id,
                error = %e,
                "unread counter increment failed"
            );
        }

        let mentioned: Vec<String> = message
            .content
            .as_deref()
            .map(mentions::extract_mentions)
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.user_id)
            .filter(|id| *id != sender.id)
            .collect();

        // Flagged offline OR absent from the registry: both checks matter,
        // because a user can be marked online with a stale connection.
        let unreachable: Vec<String> = conversation
            .participant_ids
            .iter()
            .filter(|p| p.as_str() != sender.id)
            .filter(|p| {
                !state.presence.is_online(p) || !state.chat_connections.is_connected(p)
            })
            .filter(|p| !mentioned.contains(p))
            .cloned()
            .collect();

        let (title, body) = notification_text(&conversation, &sender, &message);
        notify::dispatch(
            &state.collab,
            &unreachable,
            &PushNotification {
                kind: PushKind::Message,
                title,
                body: body.clone(),
                data: json!({
                    "conversation_id": conversation.id,
                    "message_id": message.id,
                }),
            },
        )
        .await;

        notify::dispatch(
            &state.collab,
            &mentioned,
            &PushNotification {
                kind: PushKind::Mention,
                title: format!("{} mentioned you", sender.display_name),
                body,
                data: json!({
                    "conversation_id": conversation.id,
                    "message_id": message.id,
                }),
            },
        )
        .await;
    });
}

/// Group conversations lead with the conversation name; direct ones with the
/// sender.
fn notification_text(
    conversation: &Conversation,
    sender: &UserProfile,
    message: &Message,
) -> (String, String) {
    let preview = match message.content.as_deref() {
        Some(content) if !content.is_empty() => truncate(content, PREVIEW_LENGTH),
        _ => "Sent an attachment".to_string(),
    };
    if conversation.is_group {
        let title = conversation
            .name
            .clone()
            .unwrap_or_else(|| "Group conversation".to_string());
        (title, format!("{}: {}", sender.display_name, preview))
    } else {
        (sender.display_name.clone(), preview)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut)
}

pub async fn handle_edit(
    state: &AppState,
    user_id: &str,
    payload: EditMessagePayload,
) -> Result<Ack, GatewayError> {
    let message = state
        .collab
        .messages
        .edit_message(&payload.message_id, user_id, &payload.content)
        .await?;

    let conversation_id = payload
        .conversation_id
        .unwrap_or_else(|| message.conversation_id.clone());

    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::MessageEdited {
            conversation_id: conversation_id.clone(),
            message,
        },
    ) {
        state
            .chat_rooms
            .broadcast(&state.chat_connections, &conversation_id, msg, None);
    }
    Ok(Ack::ok())
}

pub async fn handle_delete(
    state: &AppState,
    user_id: &str,
    payload: MessageRefPayload,
) -> Result<Ack, GatewayError> {
    let message = state
        .collab
        .messages
        .delete_message(&payload.message_id, user_id)
        .await?;

    let conversation_id = payload
        .conversation_id
        .unwrap_or_else(|| message.conversation_id.clone());

    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::MessageDeleted {
            conversation_id: conversation_id.clone(),
            message_id: payload.message_id,
        },
    ) {
        state
            .chat_rooms
            .broadcast(&state.chat_connections, &conversation_id, msg, None);
    }
    Ok(Ack::ok())
}

pub async fn handle_reaction_add(
    state: &AppState,
    user_id: &str,
    payload: ReactionPayload,
) -> Result<Ack, GatewayError> {
    state
        .collab
        .messages
        .add_reaction(&payload.message_id, user_id, &payload.emoji)
        .await?;

    let conversation_id = resolve_conversation(state, &payload.message_id, payload.conversation_id).await?;

    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::ReactionAdded {
            conversation_id: conversation_id.clone(),
            message_id: payload.message_id,
            user_id: user_id.to_string(),
            emoji: payload.emoji,
        },
    ) {
        state
            .chat_rooms
            .broadcast(&state.chat_connections, &conversation_id, msg, None);
    }
    Ok(Ack::ok())
}

pub async fn handle_reaction_remove(
    state: &AppState,
    user_id: &str,
    payload: ReactionPayload,
) -> Result<Ack, GatewayError> {
    state
        .collab
        .messages
        .remove_reaction(&payload.message_id, user_id, &payload.emoji)
        .await?;

    let conversation_id = resolve_conversation(state, &payload.message_id, payload.conversation_id).await?;

    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::ReactionRemoved {
            conversation_id: conversation_id.clone(),
            message_id: payload.message_id,
            user_id: user_id.to_string(),
            emoji: payload.emoji,
        },
    ) {
        state
            .chat_rooms
            .broadcast(&state.chat_connections, &conversation_id, msg, None);
    }
    Ok(Ack::ok())
}

pub async fn handle_read(
    state: &AppState,
    user_id: &str,
    payload: MessageRefPayload,
) -> Result<Ack, GatewayError> {
    state
        .collab
        .messages
        .add_read_receipt(&payload.message_id, user_id)
        .await?;

    let conversation_id = resolve_conversation(state, &payload.message_id, payload.conversation_id).await?;

    if let Err(e) = state
        .collab
        .conversations
        .mark_read(&conversation_id, user_id)
        .await
    {
        warn!(
            conversation_id = %conversation_id,
            error = %e,
            "mark-read failed"
        );
    }

    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::MessageRead {
            conversation_id: conversation_id.clone(),
            message_id: payload.message_id,
            user_id: user_id.to_string(),
        },
    ) {
        state
            .chat_rooms
            .broadcast(&state.chat_connections, &conversation_id, msg, None);
    }
    Ok(Ack::ok())
}

/// Caller-supplied conversation id wins; otherwise derive it from the
/// message record.
async fn resolve_conversation(
    state: &AppState,
    message_id: &str,
    supplied: Option<String>,
) -> Result<String, GatewayError> {
    match supplied {
        Some(conversation_id) => Ok(conversation_id),
        None => Ok(state
            .collab
            .messages
            .fetch_message(message_id)
            .await?
            .conversation_id),
    }
}
