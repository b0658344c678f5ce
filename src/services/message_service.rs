use thiserror::Error;

use crate::db::models::{DeliveryRecord, Message};
use crate::db::store::{Store, StoreError};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("topic not found")]
    TopicNotFound,
    #[error("message not found")]
    NotFound,
    #[error("you do not own this resource")]
    PermissionDenied,
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Audit listing: accepted events for one of the caller's topics, newest
/// first.
pub async fn list_for_topic(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
    page: i64,
    page_size: i64,
) -> Result<Vec<Message>, MessageError> {
    let topic = store
        .topic_by_id(topic_id)
        .await?
        .ok_or(MessageError::TopicNotFound)?;
    if topic.user_id != user_id {
        return Err(MessageError::PermissionDenied);
    }

    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * page_size;
    Ok(store.messages_by_topic(topic_id, page_size, offset).await?)
}

/// Per-attempt delivery records for one of the caller's messages.
pub async fn deliveries_for_message(
    store: &dyn Store,
    user_id: i64,
    message_id: i64,
) -> Result<Vec<DeliveryRecord>, MessageError> {
    let message = store
        .message_by_id(message_id)
        .await?
        .ok_or(MessageError::NotFound)?;
    let topic = store
        .topic_by_id(message.topic_id)
        .await?
        .ok_or(MessageError::TopicNotFound)?;
    if topic.user_id != user_id {
        return Err(MessageError::PermissionDenied);
    }
    Ok(store.deliveries_by_message(message_id).await?)
}

pub fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}
