use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::enums::{ChannelKind, ExecutionMode, SendingStrategy};
use crate::db::models::{Channel, Topic};
use crate::notifications::credentials::ChannelCredentials;

// Auth

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

/// JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub exp: usize,
}

/// Request-scoped identity attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
}

// Channels

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    pub name: String,
    pub kind: ChannelKind,
    pub credentials: ChannelCredentials,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChannelRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<ChannelKind>,
    #[serde(default)]
    pub credentials: Option<ChannelCredentials>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Channel as returned to its owner; credentials come back decrypted, the
/// same way they went in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub id: i64,
    pub name: String,
    pub kind: ChannelKind,
    pub credentials: ChannelCredentials,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Channel> for ChannelResponse {
    fn from(channel: Channel) -> Self {
        ChannelResponse {
            id: channel.id,
            name: channel.name,
            kind: channel.kind,
            credentials: channel.credentials,
            enabled: channel.enabled,
            created_at: channel.created_at,
            updated_at: channel.updated_at,
        }
    }
}

// Topics

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    pub name: String,
    #[serde(default)]
    pub sending_strategy: SendingStrategy,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sending_strategy: Option<SendingStrategy>,
    #[serde(default)]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    pub id: i64,
    pub name: String,
    pub webhook_key: String,
    pub sending_strategy: SendingStrategy,
    pub execution_mode: ExecutionMode,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Topic> for TopicResponse {
    fn from(topic: Topic) -> Self {
        TopicResponse {
            id: topic.id,
            name: topic.name,
            webhook_key: topic.webhook_key,
            sending_strategy: topic.sending_strategy,
            execution_mode: topic.execution_mode,
            description: topic.description,
            created_at: topic.created_at,
            updated_at: topic.updated_at,
        }
    }
}

// Routings

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoutingRequest {
    pub topic_id: i64,
    pub channel_id: i64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "empty_object")]
    pub variable_mappings: serde_json::Value,
    #[serde(default)]
    pub message_template: String,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoutingRequest {
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub variable_mappings: Option<serde_json::Value>,
    #[serde(default)]
    pub message_template: Option<String>,
}

// Webhook ingress

/// 202 body for async topics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAccepted {
    pub message_id: i64,
    pub status: &'static str,
    pub topic: String,
}

/// Pagination for the message audit listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePageQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}
