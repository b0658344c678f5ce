use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::enums::{
    ChannelKind, DeliveryStatus, ExecutionMode, MessageStatus, SendingStrategy,
};
use crate::notifications::credentials::ChannelCredentials;

/// An account that owns channels and topics.
/// Corresponds to the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A delivery destination with credentials for one transport kind.
/// Corresponds to the `channels` table; `credentials` is stored encrypted
/// there and is only ever handed, whole, to the sender matching `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: ChannelKind,
    pub credentials: ChannelCredentials,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An event class with its own webhook secret, strategy and execution mode.
/// Corresponds to the `topics` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub webhook_key: String,
    pub sending_strategy: SendingStrategy,
    pub execution_mode: ExecutionMode,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A templated binding from one topic to one channel.
/// Corresponds to the `routings` table; the (topic_id, channel_id) pair is
/// the primary key, so a topic routes to a given channel at most once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    pub topic_id: i64,
    pub channel_id: i64,
    /// Higher values are more important and are attempted first under
    /// `priority_failover`; ties break by ascending channel id.
    pub priority: i32,
    /// JSON object mapping template placeholder names to dot paths into the
    /// event payload.
    pub variable_mappings: serde_json::Value,
    pub message_template: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One accepted webhook event.
/// Corresponds to the `messages` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub topic_id: i64,
    pub payload: serde_json::Value,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One delivery attempt against one channel, append-only.
/// Corresponds to the `delivery_records` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub id: i64,
    pub message_id: i64,
    pub channel_id: i64,
    /// 1-based attempt counter; retries on the same channel increment it.
    pub attempt: i32,
    pub status: DeliveryStatus,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `channels`.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub user_id: i64,
    pub name: String,
    pub kind: ChannelKind,
    pub credentials: ChannelCredentials,
    pub enabled: bool,
}

/// Insert payload for `topics`.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub user_id: i64,
    pub name: String,
    pub webhook_key: String,
    pub sending_strategy: SendingStrategy,
    pub execution_mode: ExecutionMode,
    pub description: String,
}

/// Insert payload for `routings`.
#[derive(Debug, Clone)]
pub struct NewRouting {
    pub topic_id: i64,
    pub channel_id: i64,
    pub priority: i32,
    pub variable_mappings: serde_json::Value,
    pub message_template: String,
}

/// Insert payload for `delivery_records`.
#[derive(Debug, Clone)]
pub struct NewDeliveryRecord {
    pub message_id: i64,
    pub channel_id: i64,
    pub attempt: i32,
    pub status: DeliveryStatus,
    pub detail: String,
}
