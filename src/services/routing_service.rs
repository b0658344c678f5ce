use thiserror::Error;

use crate::db::models::{NewRouting, Routing};
use crate::db::store::{Store, StoreError};
use crate::web::models::{CreateRoutingRequest, UpdateRoutingRequest};

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("topic not found")]
    TopicNotFound,
    #[error("channel not found")]
    ChannelNotFound,
    #[error("routing not found")]
    NotFound,
    #[error("you do not own this resource")]
    PermissionDenied,
    #[error("a routing for this topic and channel already exists")]
    AlreadyExists,
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Checks that both ends of a routing exist and belong to `user_id`.
async fn check_ownership(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
    channel_id: i64,
) -> Result<(), RoutingError> {
    let topic = store
        .topic_by_id(topic_id)
        .await?
        .ok_or(RoutingError::TopicNotFound)?;
    if topic.user_id != user_id {
        return Err(RoutingError::PermissionDenied);
    }
    let channel = store
        .channel_by_id(channel_id)
        .await?
        .ok_or(RoutingError::ChannelNotFound)?;
    if channel.user_id != user_id {
        return Err(RoutingError::PermissionDenied);
    }
    Ok(())
}

pub async fn create_routing(
    store: &dyn Store,
    user_id: i64,
    req: CreateRoutingRequest,
) -> Result<Routing, RoutingError> {
    check_ownership(store, user_id, req.topic_id, req.channel_id).await?;
    match store
        .create_routing(NewRouting {
            topic_id: req.topic_id,
            channel_id: req.channel_id,
            priority: req.priority,
            variable_mappings: req.variable_mappings,
            message_template: req.message_template,
        })
        .await
    {
        Ok(routing) => Ok(routing),
        Err(StoreError::Duplicate(_)) => Err(RoutingError::AlreadyExists),
        Err(err) => Err(err.into()),
    }
}

pub async fn update_routing(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
    channel_id: i64,
    req: UpdateRoutingRequest,
) -> Result<Routing, RoutingError> {
    check_ownership(store, user_id, topic_id, channel_id).await?;
    let mut routing = store
        .routing(topic_id, channel_id)
        .await?
        .ok_or(RoutingError::NotFound)?;

    if let Some(priority) = req.priority {
        routing.priority = priority;
    }
    if let Some(mappings) = req.variable_mappings {
        routing.variable_mappings = mappings;
    }
    if let Some(template) = req.message_template {
        routing.message_template = template;
    }

    Ok(store.update_routing(&routing).await?)
}

pub async fn delete_routing(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
    channel_id: i64,
) -> Result<(), RoutingError> {
    check_ownership(store, user_id, topic_id, channel_id).await?;
    match store.delete_routing(topic_id, channel_id).await {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound(_)) => Err(RoutingError::NotFound),
        Err(err) => Err(err.into()),
    }
}

pub async fn list_by_topic(
    store: &dyn Store,
    user_id: i64,
    topic_id: i64,
) -> Result<Vec<Routing>, RoutingError> {
    let topic = store
        .topic_by_id(topic_id)
        .await?
        .ok_or(RoutingError::TopicNotFound)?;
    if topic.user_id != user_id {
        return Err(RoutingError::PermissionDenied);
    }
    Ok(store.routings_by_topic(topic_id).await?)
}

pub async fn list_by_channel(
    store: &dyn Store,
    user_id: i64,
    channel_id: i64,
) -> Result<Vec<Routing>, RoutingError> {
    let channel = store
        .channel_by_id(channel_id)
        .await?
        .ok_or(RoutingError::ChannelNotFound)?;
    if channel.user_id != user_id {
        return Err(RoutingError::PermissionDenied);
    }
    Ok(store.routings_by_channel(channel_id).await?)
}
