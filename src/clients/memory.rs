//! In-memory collaborator implementations.
//!
//! Used by the test suites and by local development without the sibling
//! services running. Behavior mirrors the real services closely enough for
//! the gateway's contracts: read receipts are idempotent, deletes return the
//! removed record, unknown ids surface as [`ClientError::NotFound`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{
    CallOutcome, CallRecord, CallRecordDraft, CallRecordStore, ClientError, Collaborators,
    Conversation, ConversationStore, Message, MessageDraft, MessageStore, PushDelivery,
    PushNotification, UserDirectory, UserProfile,
};

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserProfile>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.users.insert(profile.id.clone(), profile);
    }

    pub fn set_status(&self, user_id: &str, status: super::UserStatus) {
        if let Some(mut entry) = self.users.get_mut(user_id) {
            entry.status = status;
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, ClientError> {
        self.users
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClientError::NotFound(format!("user {}", user_id)))
    }

    async fn fetch_users(&self, user_ids: &[String]) -> Result<Vec<UserProfile>, ClientError> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|entry| entry.value().clone()))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<String, Conversation>,
    unread: DashMap<(String, String), u64>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conversation: Conversation) {
        self.conversations
            .insert(conversation.id.clone(), conversation);
    }

    pub fn unread_count(&self, conversation_id: &str, user_id: &str) -> u64 {
        self.unread
            .get(&(conversation_id.to_string(), user_id.to_string()))
            .map(|entry| *entry)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn conversations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ClientError> {
        Ok(self
            .conversations
            .iter()
            .filter(|entry| entry.participant_ids.iter().any(|p| p == user_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, ClientError> {
        self.conversations
            .get(conversation_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClientError::NotFound(format!("conversation {}", conversation_id)))
    }

    async fn increment_unread(
        &self,
        conversation_id: &str,
        except_user_id: &str,
    ) -> Result<(), ClientError> {
        let conversation = self.fetch_conversation(conversation_id).await?;
        for participant in &conversation.participant_ids {
            if participant == except_user_id {
                continue;
            }
            *self
                .unread
                .entry((conversation_id.to_string(), participant.clone()))
                .or_insert(0) += 1;
        }
        Ok(())
    }

    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<(), ClientError> {
        self.unread
            .insert((conversation_id.to_string(), user_id.to_string()), 0);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: DashMap<String, Message>,
    sequence: AtomicU64,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch(&self, message_id: &str) -> Option<Message> {
        self.messages.get(message_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create_message(&self, draft: &MessageDraft) -> Result<Message, ClientError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: format!("msg-{}", seq + 1),
            conversation_id: draft.conversation_id.clone(),
            sender_id: draft.sender_id.clone(),
            message_type: draft.message_type,
            content: draft.content.clone(),
            attachments: draft.attachments.clone(),
            reply_to_id: draft.reply_to_id.clone(),
            forwarded_from_id: draft.forwarded_from_id.clone(),
            reactions: Vec::new(),
            read_by: Vec::new(),
            created_at: Utc::now(),
            edited_at: None,
        };
        self.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Message, ClientError> {
        self.fetch(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {}", message_id)))
    }

    async fn edit_message(
        &self,
        message_id: &str,
        _user_id: &str,
        content: &str,
    ) -> Result<Message, ClientError> {
        let mut entry = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {}", message_id)))?;
        entry.content = Some(content.to_string());
        entry.edited_at = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn delete_message(
        &self,
        message_id: &str,
        _user_id: &str,
    ) -> Result<Message, ClientError> {
        self.messages
            .remove(message_id)
            .map(|(_, message)| message)
            .ok_or_else(|| ClientError::NotFound(format!("message {}", message_id)))
    }

    async fn add_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError> {
        let mut entry = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {}", message_id)))?;
        match entry.reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(reaction) => {
                if !reaction.user_ids.iter().any(|u| u == user_id) {
                    reaction.user_ids.push(user_id.to_string());
                }
            }
            None => entry.reactions.push(super::Reaction {
                emoji: emoji.to_string(),
                user_ids: vec![user_id.to_string()],
            }),
        }
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError> {
        let mut entry = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {}", message_id)))?;
        if let Some(reaction) = entry.reactions.iter_mut().find(|r| r.emoji == emoji) {
            reaction.user_ids.retain(|u| u != user_id);
        }
        entry.reactions.retain(|r| !r.user_ids.is_empty());
        Ok(())
    }

    async fn add_read_receipt(
        &self,
        message_id: &str,
        user_id: &str,
    ) -> Result<(), ClientError> {
        let mut entry = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| ClientError::NotFound(format!("message {}", message_id)))?;
        if !entry.read_by.iter().any(|u| u == user_id) {
            entry.read_by.push(user_id.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCallRecordStore {
    records: DashMap<String, CallRecord>,
    joined: DashMap<String, Vec<String>>,
    outcomes: DashMap<String, (CallOutcome, u64)>,
    sequence: AtomicU64,
}

impl InMemoryCallRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome_of(&self, record_id: &str) -> Option<(CallOutcome, u64)> {
        self.outcomes.get(record_id).map(|entry| *entry)
    }

    pub fn joined_users(&self, record_id: &str) -> Vec<String> {
        self.joined
            .get(record_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CallRecordStore for InMemoryCallRecordStore {
    async fn create_call(&self, draft: &CallRecordDraft) -> Result<CallRecord, ClientError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let record = CallRecord {
            id: format!("callrec-{}", seq + 1),
            conversation_id: draft.conversation_id.clone(),
            initiator_id: draft.initiator_id.clone(),
            participant_ids: draft.participant_ids.clone(),
            call_type: draft.call_type,
        };
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn participant_joined(
        &self,
        record_id: &str,
        user_id: &str,
    ) -> Result<(), ClientError> {
        self.joined
            .entry(record_id.to_string())
            .or_default()
            .push(user_id.to_string());
        Ok(())
    }

    async fn update_outcome(
        &self,
        record_id: &str,
        outcome: CallOutcome,
        duration_secs: u64,
    ) -> Result<(), ClientError> {
        self.outcomes
            .insert(record_id.to_string(), (outcome, duration_secs));
        Ok(())
    }
}

/// Push delivery double that records every dispatched notification.
#[derive(Default)]
pub struct RecordingPushDelivery {
    sent: Mutex<Vec<(String, PushNotification)>>,
}

impl RecordingPushDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, PushNotification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushDelivery for RecordingPushDelivery {
    async fn send(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> Result<(), ClientError> {
        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), notification.clone()));
        Ok(())
    }
}

/// Concrete handles to the in-memory collaborators, for seeding and
/// inspection from tests.
#[derive(Clone)]
pub struct MemoryHandles {
    pub users: Arc<InMemoryUserDirectory>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub messages: Arc<InMemoryMessageStore>,
    pub calls: Arc<InMemoryCallRecordStore>,
    pub push: Arc<RecordingPushDelivery>,
}

/// Build a [`Collaborators`] bundle backed entirely by in-memory doubles.
pub fn memory_collaborators() -> (Collaborators, MemoryHandles) {
    let handles = MemoryHandles {
        users: Arc::new(InMemoryUserDirectory::new()),
        conversations: Arc::new(InMemoryConversationStore::new()),
        messages: Arc::new(InMemoryMessageStore::new()),
        calls: Arc::new(InMemoryCallRecordStore::new()),
        push: Arc::new(RecordingPushDelivery::new()),
    };
    let collab = Collaborators {
        users: handles.users.clone(),
        conversations: handles.conversations.clone(),
        messages: handles.messages.clone(),
        calls: handles.calls.clone(),
        push: handles.push.clone(),
    };
    (collab, handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MessageType;

    fn draft(conversation: &str, sender: &str, content: &str) -> MessageDraft {
        MessageDraft {
            conversation_id: conversation.to_string(),
            sender_id: sender.to_string(),
            message_type: MessageType::Text,
            content: Some(content.to_string()),
            attachments: Vec::new(),
            reply_to_id: None,
            forwarded_from_id: None,
        }
    }

    #[tokio::test]
    async fn read_receipt_is_idempotent() {
        let store = InMemoryMessageStore::new();
        let message = store.create_message(&draft("c1", "u1", "hi")).await.unwrap();

        store.add_read_receipt(&message.id, "u2").await.unwrap();
        store.add_read_receipt(&message.id, "u2").await.unwrap();

        let stored = store.fetch(&message.id).unwrap();
        assert_eq!(stored.read_by, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn unread_increment_skips_sender() {
        let store = InMemoryConversationStore::new();
        store.insert(Conversation {
            id: "c1".to_string(),
            name: None,
            is_group: false,
            participant_ids: vec!["u1".to_string(), "u2".to_string()],
        });

        store.increment_unread("c1", "u1").await.unwrap();
        store.increment_unread("c1", "u1").await.unwrap();

        assert_eq!(store.unread_count("c1", "u1"), 0);
        assert_eq!(store.unread_count("c1", "u2"), 2);
    }
}
