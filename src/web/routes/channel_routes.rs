use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::services::channel_service::{self, ChannelError};
use crate::services::routing_service;
use crate::web::models::{
    AuthenticatedUser, ChannelResponse, CreateChannelRequest, UpdateChannelRequest,
};
use crate::web::routes::routing_routes::map_routing_error;
use crate::web::{AppState, error::AppError};

pub fn create_channel_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_channels).post(create_channel))
        .route(
            "/{id}",
            get(get_channel).put(update_channel).delete(delete_channel),
        )
        .route("/{id}/routings", get(list_channel_routings))
}

async fn create_channel(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let channel =
        channel_service::create_channel(app_state.store.as_ref(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(ChannelResponse::from(channel))))
}

async fn list_channels(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ChannelResponse>>, AppError> {
    let channels = channel_service::list_channels(app_state.store.as_ref(), user.id).await?;
    Ok(Json(channels.into_iter().map(Into::into).collect()))
}

async fn get_channel(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<ChannelResponse>, AppError> {
    let channel = channel_service::get_channel(app_state.store.as_ref(), user.id, id).await?;
    Ok(Json(channel.into()))
}

async fn update_channel(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateChannelRequest>,
) -> Result<Json<ChannelResponse>, AppError> {
    let channel =
        channel_service::update_channel(app_state.store.as_ref(), user.id, id, payload).await?;
    Ok(Json(channel.into()))
}

async fn delete_channel(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    channel_service::delete_channel(app_state.store.as_ref(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_channel_routings(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let routings = routing_service::list_by_channel(app_state.store.as_ref(), user.id, id)
        .await
        .map_err(map_routing_error)?;
    Ok(Json(routings))
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NotFound => AppError::NotFound("channel not found".to_string()),
            ChannelError::PermissionDenied => {
                AppError::Unauthorized("you do not have access to this channel".to_string())
            }
            ChannelError::InvalidCredentials(e) => AppError::InvalidInput(e.to_string()),
            ChannelError::Store(e) => e.into(),
        }
    }
}
