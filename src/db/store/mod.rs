use async_trait::async_trait;
use thiserror::Error;

use crate::db::enums::MessageStatus;
use crate::db::models::{
    Channel, DeliveryRecord, Message, NewChannel, NewDeliveryRecord, NewRouting, NewTopic,
    Routing, Topic, User,
};
use crate::services::crypto::CryptoError;

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("credential crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0} already exists")]
    Duplicate(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Persistence boundary consumed by the dispatch engine and the management
/// services. Channels, topics and routings are read-only to the engine at
/// dispatch time; only message status and delivery records are written.
///
/// Referential integrity (deleting a channel or topic removes its routings)
/// is owned by the implementations, not by callers.
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    // Channels
    async fn create_channel(&self, new: NewChannel) -> Result<Channel, StoreError>;
    async fn channel_by_id(&self, id: i64) -> Result<Option<Channel>, StoreError>;
    async fn channels_by_user(&self, user_id: i64) -> Result<Vec<Channel>, StoreError>;
    async fn update_channel(&self, channel: &Channel) -> Result<Channel, StoreError>;
    async fn delete_channel(&self, id: i64) -> Result<(), StoreError>;

    // Topics
    async fn create_topic(&self, new: NewTopic) -> Result<Topic, StoreError>;
    async fn topic_by_id(&self, id: i64) -> Result<Option<Topic>, StoreError>;
    async fn topics_by_user(&self, user_id: i64) -> Result<Vec<Topic>, StoreError>;
    async fn topic_by_webhook_key(&self, webhook_key: &str) -> Result<Option<Topic>, StoreError>;
    async fn webhook_key_in_use(&self, webhook_key: &str) -> Result<bool, StoreError>;
    async fn update_topic(&self, topic: &Topic) -> Result<Topic, StoreError>;
    async fn delete_topic(&self, id: i64) -> Result<(), StoreError>;
    /// Swaps the topic's webhook key in one atomic store operation: no
    /// concurrent reader may observe a state where both or neither of the
    /// old and new keys authenticate.
    async fn rotate_webhook_key(&self, topic_id: i64, new_key: &str) -> Result<Topic, StoreError>;

    // Routings
    async fn create_routing(&self, new: NewRouting) -> Result<Routing, StoreError>;
    async fn routing(&self, topic_id: i64, channel_id: i64) -> Result<Option<Routing>, StoreError>;
    /// Routings for a topic, ordered by priority descending, then channel id
    /// ascending.
    async fn routings_by_topic(&self, topic_id: i64) -> Result<Vec<Routing>, StoreError>;
    async fn routings_by_channel(&self, channel_id: i64) -> Result<Vec<Routing>, StoreError>;
    async fn update_routing(&self, routing: &Routing) -> Result<Routing, StoreError>;
    async fn delete_routing(&self, topic_id: i64, channel_id: i64) -> Result<(), StoreError>;

    // Messages and delivery audit
    async fn create_message(
        &self,
        topic_id: i64,
        payload: serde_json::Value,
    ) -> Result<Message, StoreError>;
    async fn message_by_id(&self, id: i64) -> Result<Option<Message>, StoreError>;
    async fn set_message_status(&self, id: i64, status: MessageStatus) -> Result<(), StoreError>;
    async fn messages_by_topic(
        &self,
        topic_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, StoreError>;
    async fn record_delivery(
        &self,
        new: NewDeliveryRecord,
    ) -> Result<DeliveryRecord, StoreError>;
    async fn deliveries_by_message(
        &self,
        message_id: i64,
    ) -> Result<Vec<DeliveryRecord>, StoreError>;
}
