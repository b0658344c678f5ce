use thiserror::Error;

use crate::db::models::{Channel, NewChannel};
use crate::db::store::{Store, StoreError};
use crate::notifications::credentials::CredentialsError;
use crate::web::models::{CreateChannelRequest, UpdateChannelRequest};

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel not found")]
    NotFound,
    #[error("you do not own this channel")]
    PermissionDenied,
    #[error(transparent)]
    InvalidCredentials(#[from] CredentialsError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

pub async fn create_channel(
    store: &dyn Store,
    user_id: i64,
    req: CreateChannelRequest,
) -> Result<Channel, ChannelError> {
    req.credentials.validate_for(req.kind)?;
    Ok(store
        .create_channel(NewChannel {
            user_id,
            name: req.name,
            kind: req.kind,
            credentials: req.credentials,
            enabled: req.enabled.unwrap_or(true),
        })
        .await?)
}

pub async fn get_channel(
    store: &dyn Store,
    user_id: i64,
    channel_id: i64,
) -> Result<Channel, ChannelError> {
    let channel = store
        .channel_by_id(channel_id)
        .await?
        .ok_or(ChannelError::NotFound)?;
    if channel.user_id != user_id {
        return Err(ChannelError::PermissionDenied);
    }
    Ok(channel)
}

pub async fn list_channels(store: &dyn Store, user_id: i64) -> Result<Vec<Channel>, ChannelError> {
    Ok(store.channels_by_user(user_id).await?)
}

pub async fn update_channel(
    store: &dyn Store,
    user_id: i64,
    channel_id: i64,
    req: UpdateChannelRequest,
) -> Result<Channel, ChannelError> {
    let mut channel = get_channel(store, user_id, channel_id).await?;

    if let Some(name) = req.name {
        channel.name = name;
    }
    if let Some(kind) = req.kind {
        channel.kind = kind;
    }
    if let Some(credentials) = req.credentials {
        channel.credentials = credentials;
    }
    if let Some(enabled) = req.enabled {
        channel.enabled = enabled;
    }

    // The (possibly unchanged) credentials must still fit the (possibly
    // changed) kind.
    channel.credentials.validate_for(channel.kind)?;

    Ok(store.update_channel(&channel).await?)
}

pub async fn delete_channel(
    store: &dyn Store,
    user_id: i64,
    channel_id: i64,
) -> Result<(), ChannelError> {
    get_channel(store, user_id, channel_id).await?;
    Ok(store.delete_channel(channel_id).await?)
}
