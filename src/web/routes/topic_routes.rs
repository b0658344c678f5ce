use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;

use crate::services::message_service::{self, MessageError};
use crate::services::routing_service;
use crate::services::topic_service::{self, TopicError};
use crate::web::models::{
    AuthenticatedUser, CreateTopicRequest, MessagePageQuery, TopicResponse, UpdateTopicRequest,
};
use crate::web::routes::routing_routes::map_routing_error;
use crate::web::{AppState, error::AppError};

pub fn create_topic_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_topics).post(create_topic))
        .route(
            "/{id}",
            get(get_topic).put(update_topic).delete(delete_topic),
        )
        .route("/{id}/regenerate-key", post(regenerate_key))
        .route("/{id}/routings", get(list_topic_routings))
        .route("/{id}/messages", get(list_topic_messages))
}

async fn create_topic(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let topic = topic_service::create_topic(app_state.store.as_ref(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(TopicResponse::from(topic))))
}

async fn list_topics(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<TopicResponse>>, AppError> {
    let topics = topic_service::list_topics(app_state.store.as_ref(), user.id).await?;
    Ok(Json(topics.into_iter().map(Into::into).collect()))
}

async fn get_topic(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<TopicResponse>, AppError> {
    let topic = topic_service::get_topic(app_state.store.as_ref(), user.id, id).await?;
    Ok(Json(topic.into()))
}

async fn update_topic(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<Json<TopicResponse>, AppError> {
    let topic = topic_service::update_topic(app_state.store.as_ref(), user.id, id, payload).await?;
    Ok(Json(topic.into()))
}

async fn delete_topic(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    topic_service::delete_topic(app_state.store.as_ref(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rotates the topic's webhook key; the previous key stops authenticating
/// the moment this call returns.
async fn regenerate_key(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<TopicResponse>, AppError> {
    let topic =
        topic_service::regenerate_webhook_key(app_state.store.as_ref(), user.id, id).await?;
    Ok(Json(topic.into()))
}

async fn list_topic_routings(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let routings = routing_service::list_by_topic(app_state.store.as_ref(), user.id, id)
        .await
        .map_err(map_routing_error)?;
    Ok(Json(routings))
}

async fn list_topic_messages(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Query(query): Query<MessagePageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let messages = message_service::list_for_topic(
        app_state.store.as_ref(),
        user.id,
        id,
        query.page.unwrap_or(1),
        query
            .page_size
            .unwrap_or_else(message_service::default_page_size),
    )
    .await?;
    Ok(Json(messages))
}

impl From<TopicError> for AppError {
    fn from(err: TopicError) -> Self {
        match err {
            TopicError::NotFound => AppError::NotFound("topic not found".to_string()),
            TopicError::PermissionDenied => {
                AppError::Unauthorized("you do not have access to this topic".to_string())
            }
            TopicError::Store(e) => e.into(),
        }
    }
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::TopicNotFound => AppError::NotFound("topic not found".to_string()),
            MessageError::NotFound => AppError::NotFound("message not found".to_string()),
            MessageError::PermissionDenied => {
                AppError::Unauthorized("you do not have access to this resource".to_string())
            }
            MessageError::Store(e) => e.into(),
        }
    }
}
