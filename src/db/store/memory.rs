use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::enums::MessageStatus;
use crate::db::models::{
    Channel, DeliveryRecord, Message, NewChannel, NewDeliveryRecord, NewRouting, NewTopic,
    Routing, Topic, User,
};
use crate::db::store::{Store, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    channels: HashMap<i64, Channel>,
    topics: HashMap<i64, Topic>,
    routings: HashMap<(i64, i64), Routing>,
    messages: HashMap<i64, Message>,
    deliveries: Vec<DeliveryRecord>,
    next_user_id: i64,
    next_channel_id: i64,
    next_topic_id: i64,
    next_message_id: i64,
    next_delivery_id: i64,
}

/// In-memory [`Store`] used by tests and single-process demos. Everything
/// lives behind one `RwLock`, which also makes webhook-key rotation a
/// plain atomic swap with respect to concurrent readers.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ordered_topic_routings(inner: &Inner, topic_id: i64) -> Vec<Routing> {
    let mut routings: Vec<Routing> = inner
        .routings
        .values()
        .filter(|r| r.topic_id == topic_id)
        .cloned()
        .collect();
    routings.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.channel_id.cmp(&b.channel_id))
    });
    routings
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == username) {
            return Err(StoreError::Duplicate("username"));
        }
        inner.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_channel(&self, new: NewChannel) -> Result<Channel, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_channel_id += 1;
        let now = Utc::now();
        let channel = Channel {
            id: inner.next_channel_id,
            user_id: new.user_id,
            name: new.name,
            kind: new.kind,
            credentials: new.credentials,
            enabled: new.enabled,
            created_at: now,
            updated_at: now,
        };
        inner.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn channel_by_id(&self, id: i64) -> Result<Option<Channel>, StoreError> {
        Ok(self.inner.read().await.channels.get(&id).cloned())
    }

    async fn channels_by_user(&self, user_id: i64) -> Result<Vec<Channel>, StoreError> {
        let inner = self.inner.read().await;
        let mut channels: Vec<Channel> = inner
            .channels
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn update_channel(&self, channel: &Channel) -> Result<Channel, StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .channels
            .get_mut(&channel.id)
            .ok_or(StoreError::NotFound("channel"))?;
        let mut updated = channel.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete_channel(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .channels
            .remove(&id)
            .ok_or(StoreError::NotFound("channel"))?;
        inner.routings.retain(|_, r| r.channel_id != id);
        Ok(())
    }

    async fn create_topic(&self, new: NewTopic) -> Result<Topic, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .topics
            .values()
            .any(|t| t.webhook_key == new.webhook_key)
        {
            return Err(StoreError::Duplicate("webhook key"));
        }
        inner.next_topic_id += 1;
        let now = Utc::now();
        let topic = Topic {
            id: inner.next_topic_id,
            user_id: new.user_id,
            name: new.name,
            webhook_key: new.webhook_key,
            sending_strategy: new.sending_strategy,
            execution_mode: new.execution_mode,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        inner.topics.insert(topic.id, topic.clone());
        Ok(topic)
    }

    async fn topic_by_id(&self, id: i64) -> Result<Option<Topic>, StoreError> {
        Ok(self.inner.read().await.topics.get(&id).cloned())
    }

    async fn topics_by_user(&self, user_id: i64) -> Result<Vec<Topic>, StoreError> {
        let inner = self.inner.read().await;
        let mut topics: Vec<Topic> = inner
            .topics
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        topics.sort_by_key(|t| t.id);
        Ok(topics)
    }

    async fn topic_by_webhook_key(&self, webhook_key: &str) -> Result<Option<Topic>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .topics
            .values()
            .find(|t| t.webhook_key == webhook_key)
            .cloned())
    }

    async fn webhook_key_in_use(&self, webhook_key: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .topics
            .values()
            .any(|t| t.webhook_key == webhook_key))
    }

    async fn update_topic(&self, topic: &Topic) -> Result<Topic, StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .topics
            .get_mut(&topic.id)
            .ok_or(StoreError::NotFound("topic"))?;
        let mut updated = topic.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete_topic(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .topics
            .remove(&id)
            .ok_or(StoreError::NotFound("topic"))?;
        inner.routings.retain(|_, r| r.topic_id != id);
        let message_ids: Vec<i64> = inner
            .messages
            .values()
            .filter(|m| m.topic_id == id)
            .map(|m| m.id)
            .collect();
        inner.messages.retain(|_, m| m.topic_id != id);
        inner
            .deliveries
            .retain(|d| !message_ids.contains(&d.message_id));
        Ok(())
    }

    async fn rotate_webhook_key(&self, topic_id: i64, new_key: &str) -> Result<Topic, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .topics
            .values()
            .any(|t| t.id != topic_id && t.webhook_key == new_key)
        {
            return Err(StoreError::Duplicate("webhook key"));
        }
        let topic = inner
            .topics
            .get_mut(&topic_id)
            .ok_or(StoreError::NotFound("topic"))?;
        topic.webhook_key = new_key.to_string();
        topic.updated_at = Utc::now();
        Ok(topic.clone())
    }

    async fn create_routing(&self, new: NewRouting) -> Result<Routing, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (new.topic_id, new.channel_id);
        if inner.routings.contains_key(&key) {
            return Err(StoreError::Duplicate("routing"));
        }
        let now = Utc::now();
        let routing = Routing {
            topic_id: new.topic_id,
            channel_id: new.channel_id,
            priority: new.priority,
            variable_mappings: new.variable_mappings,
            message_template: new.message_template,
            created_at: now,
            updated_at: now,
        };
        inner.routings.insert(key, routing.clone());
        Ok(routing)
    }

    async fn routing(&self, topic_id: i64, channel_id: i64) -> Result<Option<Routing>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .routings
            .get(&(topic_id, channel_id))
            .cloned())
    }

    async fn routings_by_topic(&self, topic_id: i64) -> Result<Vec<Routing>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ordered_topic_routings(&inner, topic_id))
    }

    async fn routings_by_channel(&self, channel_id: i64) -> Result<Vec<Routing>, StoreError> {
        let inner = self.inner.read().await;
        let mut routings: Vec<Routing> = inner
            .routings
            .values()
            .filter(|r| r.channel_id == channel_id)
            .cloned()
            .collect();
        routings.sort_by_key(|r| r.topic_id);
        Ok(routings)
    }

    async fn update_routing(&self, routing: &Routing) -> Result<Routing, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (routing.topic_id, routing.channel_id);
        let existing = inner
            .routings
            .get_mut(&key)
            .ok_or(StoreError::NotFound("routing"))?;
        let mut updated = routing.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete_routing(&self, topic_id: i64, channel_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .routings
            .remove(&(topic_id, channel_id))
            .ok_or(StoreError::NotFound("routing"))?;
        Ok(())
    }

    async fn create_message(
        &self,
        topic_id: i64,
        payload: serde_json::Value,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_message_id += 1;
        let now = Utc::now();
        let message = Message {
            id: inner.next_message_id,
            topic_id,
            payload,
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn message_by_id(&self, id: i64) -> Result<Option<Message>, StoreError> {
        Ok(self.inner.read().await.messages.get(&id).cloned())
    }

    async fn set_message_status(&self, id: i64, status: MessageStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let message = inner
            .messages
            .get_mut(&id)
            .ok_or(StoreError::NotFound("message"))?;
        message.status = status;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn messages_by_topic(
        &self,
        topic_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.topic_id == topic_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| std::cmp::Reverse(m.id));
        Ok(messages
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn record_delivery(
        &self,
        new: NewDeliveryRecord,
    ) -> Result<DeliveryRecord, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_delivery_id += 1;
        let record = DeliveryRecord {
            id: inner.next_delivery_id,
            message_id: new.message_id,
            channel_id: new.channel_id,
            attempt: new.attempt,
            status: new.status,
            detail: new.detail,
            created_at: Utc::now(),
        };
        inner.deliveries.push(record.clone());
        Ok(record)
    }

    async fn deliveries_by_message(
        &self,
        message_id: i64,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .deliveries
            .iter()
            .filter(|d| d.message_id == message_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{ChannelKind, ExecutionMode, SendingStrategy};
    use crate::notifications::credentials::ChannelCredentials;

    fn slack_channel(user_id: i64) -> NewChannel {
        NewChannel {
            user_id,
            name: "ops".into(),
            kind: ChannelKind::Slack,
            credentials: ChannelCredentials::Slack {
                webhook_url: "https://hooks.slack.example/T/B".into(),
            },
            enabled: true,
        }
    }

    #[tokio::test]
    async fn deleting_a_channel_cascades_to_routings() {
        let store = MemStore::new();
        let user = store.create_user("ada", "hash").await.unwrap();
        let channel = store.create_channel(slack_channel(user.id)).await.unwrap();
        let topic = store
            .create_topic(NewTopic {
                user_id: user.id,
                name: "deploys".into(),
                webhook_key: "k1".into(),
                sending_strategy: SendingStrategy::Broadcast,
                execution_mode: ExecutionMode::Async,
                description: String::new(),
            })
            .await
            .unwrap();
        store
            .create_routing(NewRouting {
                topic_id: topic.id,
                channel_id: channel.id,
                priority: 0,
                variable_mappings: serde_json::json!({}),
                message_template: "hi".into(),
            })
            .await
            .unwrap();

        store.delete_channel(channel.id).await.unwrap();
        assert!(store.routings_by_topic(topic.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_routing_pairs_are_rejected() {
        let store = MemStore::new();
        let user = store.create_user("ada", "hash").await.unwrap();
        let channel = store.create_channel(slack_channel(user.id)).await.unwrap();
        let topic = store
            .create_topic(NewTopic {
                user_id: user.id,
                name: "deploys".into(),
                webhook_key: "k2".into(),
                sending_strategy: SendingStrategy::Broadcast,
                execution_mode: ExecutionMode::Async,
                description: String::new(),
            })
            .await
            .unwrap();
        let new = NewRouting {
            topic_id: topic.id,
            channel_id: channel.id,
            priority: 0,
            variable_mappings: serde_json::json!({}),
            message_template: String::new(),
        };
        store.create_routing(new.clone()).await.unwrap();
        assert!(matches!(
            store.create_routing(new).await,
            Err(StoreError::Duplicate("routing"))
        ));
    }
}
