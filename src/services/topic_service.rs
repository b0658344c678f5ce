use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{NewTopic, Topic};
use crate::db::store::{Store, StoreError};
use crate::web::models::{CreateTopicRequest, UpdateTopicRequest};

#[derive(Error, Debug)]
pub enum TopicError {
    #[error("topic not found")]
    NotFound,
    #[error("you do not own this topic")]
    PermissionDenied,
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

pub async fn create_topic(
    store: &dyn Store,
    user_id: i64,
    req: CreateTopicRequest,
) -> Result<Topic, TopicError> {
    let webhook_key = generate_webhook_key(store).await?;
    Ok(store
        .create_topic(NewTopic {
            user_id,
            name: req.name,
            webhook_key,
            sending_strategy: req.sending_strategy,
            execution_mode: req.execution_mode,
            description: req.description,
        })
        .await?)
}

pub async fn get_topic(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
) -> Result<Topic, TopicError> {
    let topic = store
        .topic_by_id(topic_id)
        .await?
        .ok_or(TopicError::NotFound)?;
    if topic.user_id != user_id {
        return Err(TopicError::PermissionDenied);
    }
    Ok(topic)
}

pub async fn list_topics(store: &dyn Store, user_id: i64) -> Result<Vec<Topic>, TopicError> {
    Ok(store.topics_by_user(user_id).await?)
}

/// Updates a topic's settings. The webhook key is immutable here; it only
/// changes through [`regenerate_webhook_key`].
pub async fn update_topic(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
    req: UpdateTopicRequest,
) -> Result<Topic, TopicError> {
    let mut topic = get_topic(store, user_id, topic_id).await?;

    if let Some(name) = req.name {
        topic.name = name;
    }
    if let Some(strategy) = req.sending_strategy {
        topic.sending_strategy = strategy;
    }
    if let Some(mode) = req.execution_mode {
        topic.execution_mode = mode;
    }
    if let Some(description) = req.description {
        topic.description = description;
    }

    Ok(store.update_topic(&topic).await?)
}

pub async fn delete_topic(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
) -> Result<(), TopicError> {
    get_topic(store, user_id, topic_id).await?;
    Ok(store.delete_topic(topic_id).await?)
}

/// Rotates the topic's webhook key. The swap is atomic in the store: the
/// moment it completes, the old key stops authenticating and the new one
/// starts; there is no window where both or neither are valid.
pub async fn regenerate_webhook_key(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
) -> Result<Topic, TopicError> {
    get_topic(store, user_id, topic_id).await?;
    let new_key = generate_webhook_key(store).await?;
    Ok(store.rotate_webhook_key(topic_id, &new_key).await?)
}

/// Generates a webhook key that is unique across all topics.
async fn generate_webhook_key(store: &dyn Store) -> Result<String, StoreError> {
    loop {
        let key = Uuid::new_v4().simple().to_string();
        if !store.webhook_key_in_use(&key).await? {
            return Ok(key);
        }
    }
}
