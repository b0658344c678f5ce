use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};
use std::sync::Arc;

use crate::services::routing_service::{self, RoutingError};
use crate::web::models::{AuthenticatedUser, CreateRoutingRequest, UpdateRoutingRequest};
use crate::web::{AppState, error::AppError};

pub fn create_routing_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_routing))
        .route(
            "/{topic_id}/{channel_id}",
            put(update_routing).delete(delete_routing),
        )
}

async fn create_routing(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateRoutingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let routing = routing_service::create_routing(app_state.store.as_ref(), user.id, payload)
        .await
        .map_err(map_routing_error)?;
    Ok((StatusCode::CREATED, Json(routing)))
}

async fn update_routing(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((topic_id, channel_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateRoutingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let routing = routing_service::update_routing(
        app_state.store.as_ref(),
        user.id,
        topic_id,
        channel_id,
        payload,
    )
    .await
    .map_err(map_routing_error)?;
    Ok(Json(routing))
}

async fn delete_routing(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((topic_id, channel_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    routing_service::delete_routing(app_state.store.as_ref(), user.id, topic_id, channel_id)
        .await
        .map_err(map_routing_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn map_routing_error(err: RoutingError) -> AppError {
    match err {
        RoutingError::TopicNotFound => AppError::NotFound("topic not found".to_string()),
        RoutingError::ChannelNotFound => AppError::NotFound("channel not found".to_string()),
        RoutingError::NotFound => AppError::NotFound("routing not found".to_string()),
        RoutingError::PermissionDenied => {
            AppError::Unauthorized("you do not have access to this resource".to_string())
        }
        RoutingError::AlreadyExists => {
            AppError::Conflict("a routing for this topic and channel already exists".to_string())
        }
        RoutingError::Store(e) => e.into(),
    }
}
