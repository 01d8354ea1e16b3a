//! HTTP implementations of the collaborator contracts.
//!
//! Each sibling service exposes a small JSON API; these clients are thin
//! wrappers that map non-2xx responses into [`ClientError::Status`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use super::{
    CallOutcome, CallRecord, CallRecordDraft, CallRecordStore, ClientError, Conversation,
    ConversationStore, Message, MessageDraft, MessageStore, PushDelivery, PushNotification,
    UserDirectory, UserProfile,
};

fn check(service: &'static str, resp: &reqwest::Response) -> Result<(), ClientError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(format!("{} {}", service, resp.url())));
    }
    if !status.is_success() {
        return Err(ClientError::Status {
            service,
            status: status.as_u16(),
        });
    }
    Ok(())
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    service: &'static str,
    url: String,
) -> Result<T, ClientError> {
    let resp = client.get(&url).send().await?;
    check(service, &resp)?;
    Ok(resp.json().await?)
}

async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    service: &'static str,
    url: String,
    body: &B,
) -> Result<T, ClientError> {
    let resp = client.post(&url).json(body).send().await?;
    check(service, &resp)?;
    Ok(resp.json().await?)
}

async fn post_unit<B: Serialize>(
    client: &reqwest::Client,
    service: &'static str,
    url: String,
    body: &B,
) -> Result<(), ClientError> {
    let resp = client.post(&url).json(body).send().await?;
    check(service, &resp)
}

pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn fetch_user(&self, user_id: &str) -> Result<UserProfile, ClientError> {
        get_json(
            &self.client,
            "user-service",
            format!("{}/api/users/{}", self.base_url, user_id),
        )
        .await
    }

    async fn fetch_users(&self, user_ids: &[String]) -> Result<Vec<UserProfile>, ClientError> {
        post_json(
            &self.client,
            "user-service",
            format!("{}/api/users/batch", self.base_url),
            &json!({ "ids": user_ids }),
        )
        .await
    }
}

pub struct HttpConversationStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConversationStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ConversationStore for HttpConversationStore {
    async fn conversations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ClientError> {
        get_json(
            &self.client,
            "channel-service",
            format!("{}/api/users/{}/conversations", self.base_url, user_id),
        )
        .await
    }

    async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, ClientError> {
        get_json(
            &self.client,
            "channel-service",
            format!("{}/api/conversations/{}", self.base_url, conversation_id),
        )
        .await
    }

    async fn increment_unread(
        &self,
        conversation_id: &str,
        except_user_id: &str,
    ) -> Result<(), ClientError> {
        post_unit(
            &self.client,
            "channel-service",
            format!(
                "{}/api/conversations/{}/unread",
                self.base_url, conversation_id
            ),
            &json!({ "except_user_id": except_user_id }),
        )
        .await
    }

    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<(), ClientError> {
        post_unit(
            &self.client,
            "channel-service",
            format!(
                "{}/api/conversations/{}/read",
                self.base_url, conversation_id
            ),
            &json!({ "user_id": user_id }),
        )
        .await
    }
}

pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn create_message(&self, draft: &MessageDraft) -> Result<Message, ClientError> {
        post_json(
            &self.client,
            "message-service",
            format!("{}/api/messages", self.base_url),
            draft,
        )
        .await
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Message, ClientError> {
        get_json(
            &self.client,
            "message-service",
            format!("{}/api/messages/{}", self.base_url, message_id),
        )
        .await
    }

    async fn edit_message(
        &self,
        message_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Message, ClientError> {
        let resp = self
            .client
            .patch(format!("{}/api/messages/{}", self.base_url, message_id))
            .json(&json!({ "user_id": user_id, "content": content }))
            .send()
            .await?;
        check("message-service", &resp)?;
        Ok(resp.json().await?)
    }

    async fn delete_message(
        &self,
        message_id: &str,
        user_id: &str,
    ) -> Result<Message, ClientError> {
        let resp = self
            .client
            .delete(format!("{}/api/messages/{}", self.base_url, message_id))
            .json(&json!({ "user_id": user_id }))
            .send()
            .await?;
        check("message-service", &resp)?;
        Ok(resp.json().await?)
    }

    async fn add_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError> {
        post_unit(
            &self.client,
            "message-service",
            format!("{}/api/messages/{}/reactions", self.base_url, message_id),
            &json!({ "user_id": user_id, "emoji": emoji }),
        )
        .await
    }

    async fn remove_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<(), ClientError> {
        let resp = self
            .client
            .delete(format!(
                "{}/api/messages/{}/reactions",
                self.base_url, message_id
            ))
            .json(&json!({ "user_id": user_id, "emoji": emoji }))
            .send()
            .await?;
        check("message-service", &resp)
    }

    async fn add_read_receipt(
        &self,
        message_id: &str,
        user_id: &str,
    ) -> Result<(), ClientError> {
        post_unit(
            &self.client,
            "message-service",
            format!("{}/api/messages/{}/read", self.base_url, message_id),
            &json!({ "user_id": user_id }),
        )
        .await
    }
}

pub struct HttpCallRecordStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCallRecordStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CallRecordStore for HttpCallRecordStore {
    async fn create_call(&self, draft: &CallRecordDraft) -> Result<CallRecord, ClientError> {
        post_json(
            &self.client,
            "call-service",
            format!("{}/api/calls", self.base_url),
            draft,
        )
        .await
    }

    async fn participant_joined(
        &self,
        record_id: &str,
        user_id: &str,
    ) -> Result<(), ClientError> {
        post_unit(
            &self.client,
            "call-service",
            format!("{}/api/calls/{}/participants", self.base_url, record_id),
            &json!({ "user_id": user_id }),
        )
        .await
    }

    async fn update_outcome(
        &self,
        record_id: &str,
        outcome: CallOutcome,
        duration_secs: u64,
    ) -> Result<(), ClientError> {
        let resp = self
            .client
            .patch(format!("{}/api/calls/{}", self.base_url, record_id))
            .json(&json!({ "status": outcome.as_str(), "duration_secs": duration_secs }))
            .send()
            .await?;
        check("call-service", &resp)
    }
}

pub struct HttpPushDelivery {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPushDelivery {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PushDelivery for HttpPushDelivery {
    async fn send(
        &self,
        device_token: &str,
        notification: &PushNotification,
    ) -> Result<(), ClientError> {
        post_unit(
            &self.client,
            "notification-service",
            format!("{}/api/notifications/push", self.base_url),
            &json!({
                "device_token": device_token,
                "kind": notification.kind,
                "title": notification.title,
                "body": notification.body,
                "data": notification.data,
            }),
        )
        .await
    }
}
