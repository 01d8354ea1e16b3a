//! Collaborator contracts consumed by the gateway.
//!
//! The gateway persists nothing itself: users, conversations, messages, call
//! records, and push delivery all live in sibling services. Each contract is
//! a trait object so the HTTP clients in [`http`] and the in-memory doubles
//! in [`memory`] are interchangeable.

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error from a collaborator call. Callers decide whether it aborts the
/// request (persistence on the primary path) or is logged and swallowed
/// (best-effort side effects).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("not found: {0}")]
    NotFound(String),
}

// --- Data contracts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub status: UserStatus,
    /// Device push tokens. Never forwarded to other clients.
    #[serde(default)]
    pub device_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_group: bool,
    pub participant_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_from_id: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub read_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

/// Fields the gateway supplies when asking the message store to create the
/// canonical message record.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDraft {
    pub conversation_id: String,
    pub sender_id: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded_from_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

/// Terminal outcome recorded against a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Completed,
    Missed,
    Rejected,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Completed => "completed",
            CallOutcome::Missed => "missed",
            CallOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallRecordDraft {
    pub conversation_id: String,
    pub initiator_id: String,
    pub participant_ids: Vec<String>,
    pub call_type: CallKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,
    pub conversation_id: String,
    pub initiator_id: String,
    pub participant_ids: Vec<String>,
    pub call_type: CallKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    Message,
    Mention,
    CallWake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotification {
    pub kind: PushKind,
    pub title: String,
    pub body: String,
    /// Opaque payload handed to the client app (conversation id, call id, …).
    pub data: serde_json::Value,
}

// --- Contracts ---

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, ClientError>;

    /// Batch lookup. Unknown ids are omitted from the result, not an error.
    async fn fetch_users(&self, user_ids: &[String]) -> Result<Vec<UserProfile>, ClientError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn conversations_for_user(&self, user_id: &str)
        -> Result<Vec<Conversation>, ClientError>;

    async fn fetch_conversation(&self, conversation_id: &str)
        -> Result<Conversation, ClientError>;

    /// Bump unread counters for every participant except `except_user_id`.
    async fn increment_unread(
        &self,
        conversation_id: &str,
        except_user_id: &str,
    ) -> Result<(), ClientError>;

    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, draft: &MessageDraft) -> Result<Message, ClientError>;

    async fn fetch_message(&self, message_id: &str) -> Result<Message, ClientError>;

    async fn edit_message(
        &self,
        message_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Message, ClientError>;

    /// Deletes and returns the record so callers can still derive the
    /// conversation for the room broadcast.
    async fn delete_message(&self, message_id: &str, user_id: &str)
        -> Result<Message, ClientError>;

    async fn add_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError>;

    async fn remove_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError>;

    /// Idempotent per `(message_id, user_id)`.
    async fn add_read_receipt(&self, message_id: &str, user_id: &str)
        -> Result<(), ClientError>;
}

#[async_trait]
pub trait CallRecordStore: Send + Sync {
    async fn create_call(&self, draft: &CallRecordDraft) -> Result<CallRecord, ClientError>;

    async fn participant_joined(&self, record_id: &str, user_id: &str)
        -> Result<(), ClientError>;

    async fn update_outcome(
        &self,
        record_id: &str,
        outcome: CallOutcome,
        duration_secs: u64,
    ) -> Result<(), ClientError>;
}

#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn send(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> Result<(), ClientError>;
}

/// The full set of collaborator handles carried in [`crate::state::AppState`].
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserDirectory>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub calls: Arc<dyn CallRecordStore>,
    pub push: Arc<dyn PushDelivery>,
}
