//! Wire protocol for both WebSocket channels.
//!
//! Frames are JSON text messages shaped as `{"id", "event", "data"}`. Client
//! events decode into a tagged-union enum per channel and are dispatched
//! through a single `match` in the read loop; event names never leak into
//! business logic as bare strings. The optional `id` ties an acknowledgement
//! back to the request that produced it.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::{
    Attachment, CallKind, CallOutcome, Conversation, Message as ChatMessage, MessageType,
    UserProfile,
};
use crate::error::GatewayError;

/// Inbound frame: request id plus one event from the channel's tagged union.
#[derive(Debug, Deserialize)]
pub struct ClientFrame<E> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub event: E,
}

/// Outbound frame. `id` echoes the request for acks, absent on broadcasts.
#[derive(Debug, Serialize)]
pub struct ServerFrame<E> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub event: E,
}

/// Encode a server event as a WebSocket text frame.
pub fn encode<E: Serialize>(id: Option<String>, event: &E) -> Option<Message> {
    serde_json::to_string(&ServerFrame { id, event })
        .ok()
        .map(|json| Message::Text(json.into()))
}

/// Structured acknowledgement for a client request.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Option<Value>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    pub fn ok_with(data: Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn err(error: &GatewayError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            data: None,
        }
    }
}

/// Public slice of a user profile, safe to broadcast (no device tokens).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&UserProfile> for UserSummary {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

// --- Messaging channel ---

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessagePayload {
    pub conversation_id: String,
    #[serde(default = "default_message_type", rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub forwarded_from_id: Option<String>,
}

fn default_message_type() -> MessageType {
    MessageType::Text
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditMessagePayload {
    pub message_id: String,
    pub content: String,
    /// Caller-supplied room hint; when absent the room is derived from the
    /// message record.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRefPayload {
    pub message_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionPayload {
    pub message_id: String,
    pub emoji: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRefPayload {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChatClientEvent {
    #[serde(rename = "message:send")]
    MessageSend(SendMessagePayload),
    #[serde(rename = "message:edited")]
    MessageEdit(EditMessagePayload),
    #[serde(rename = "message:deleted")]
    MessageDelete(MessageRefPayload),
    #[serde(rename = "message:reaction:add")]
    ReactionAdd(ReactionPayload),
    #[serde(rename = "message:reaction:remove")]
    ReactionRemove(ReactionPayload),
    #[serde(rename = "message:read")]
    MessageRead(MessageRefPayload),
    #[serde(rename = "typing:start")]
    TypingStart(ConversationRefPayload),
    #[serde(rename = "typing:stop")]
    TypingStop(ConversationRefPayload),
    #[serde(rename = "conversation:join")]
    ConversationJoin(ConversationRefPayload),
    #[serde(rename = "conversation:leave")]
    ConversationLeave(ConversationRefPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ChatServerEvent {
    #[serde(rename = "ack")]
    Ack(Ack),
    #[serde(rename = "message:new")]
    MessageNew {
        message: ChatMessage,
        conversation: Conversation,
        sender: UserSummary,
    },
    #[serde(rename = "message:edited")]
    MessageEdited {
        conversation_id: String,
        message: ChatMessage,
    },
    #[serde(rename = "message:deleted")]
    MessageDeleted {
        conversation_id: String,
        message_id: String,
    },
    #[serde(rename = "message:reaction:added")]
    ReactionAdded {
        conversation_id: String,
        message_id: String,
        user_id: String,
        emoji: String,
    },
    #[serde(rename = "message:reaction:removed")]
    ReactionRemoved {
        conversation_id: String,
        message_id: String,
        user_id: String,
        emoji: String,
    },
    #[serde(rename = "message:read")]
    MessageRead {
        conversation_id: String,
        message_id: String,
        user_id: String,
    },
    #[serde(rename = "typing:start")]
    TypingStart {
        conversation_id: String,
        user_id: String,
    },
    #[serde(rename = "typing:stop")]
    TypingStop {
        conversation_id: String,
        user_id: String,
    },
    #[serde(rename = "user:online")]
    UserOnline { user_id: String },
    #[serde(rename = "user:offline")]
    UserOffline {
        user_id: String,
        last_seen: chrono::DateTime<chrono::Utc>,
    },
}

// --- Call-signaling channel ---

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateCallPayload {
    pub conversation_id: String,
    pub participant_ids: Vec<String>,
    pub call_type: CallKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallRefPayload {
    pub call_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SdpPayload {
    pub call_id: String,
    pub target_user_id: String,
    /// Forwarded verbatim; the gateway never inspects SDP.
    pub sdp: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IceCandidatePayload {
    pub call_id: String,
    pub target_user_id: String,
    pub candidate: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleAudioPayload {
    pub call_id: String,
    pub muted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleVideoPayload {
    pub call_id: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum CallClientEvent {
    #[serde(rename = "call:initiate")]
    Initiate(InitiateCallPayload),
    #[serde(rename = "call:answer")]
    Answer(CallRefPayload),
    #[serde(rename = "call:reject")]
    Reject(CallRefPayload),
    #[serde(rename = "call:end")]
    End(CallRefPayload),
    #[serde(rename = "webrtc:offer")]
    Offer(SdpPayload),
    #[serde(rename = "webrtc:answer")]
    SdpAnswer(SdpPayload),
    #[serde(rename = "webrtc:ice-candidate")]
    IceCandidate(IceCandidatePayload),
    #[serde(rename = "call:toggle-audio")]
    ToggleAudio(ToggleAudioPayload),
    #[serde(rename = "call:toggle-video")]
    ToggleVideo(ToggleVideoPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum CallServerEvent {
    #[serde(rename = "ack")]
    Ack(Ack),
    #[serde(rename = "call:incoming")]
    CallIncoming {
        call_id: String,
        conversation_id: String,
        initiator_id: String,
        participant_ids: Vec<String>,
        call_type: CallKind,
    },
    #[serde(rename = "call:participant:joined")]
    ParticipantJoined { call_id: String, user_id: String },
    #[serde(rename = "call:rejected")]
    CallRejected { call_id: String, user_id: String },
    #[serde(rename = "call:ended")]
    CallEnded {
        call_id: String,
        outcome: CallOutcome,
        duration_secs: u64,
    },
    #[serde(rename = "webrtc:offer")]
    Offer {
        call_id: String,
        sender_user_id: String,
        sdp: Value,
    },
    #[serde(rename = "webrtc:answer")]
    SdpAnswer {
        call_id: String,
        sender_user_id: String,
        sdp: Value,
    },
    #[serde(rename = "webrtc:ice-candidate")]
    IceCandidate {
        call_id: String,
        sender_user_id: String,
        candidate: Value,
    },
    #[serde(rename = "call:audio-toggled")]
    AudioToggled {
        call_id: String,
        user_id: String,
        muted: bool,
    },
    #[serde(rename = "call:video-toggled")]
    VideoToggled {
        call_id: String,
        user_id: String,
        enabled: bool,
    },
}
