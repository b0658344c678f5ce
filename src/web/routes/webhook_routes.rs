use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tracing::info;

use crate::db::enums::{ExecutionMode, MessageStatus};
use crate::db::models::Topic;
use crate::db::store::Store;
use crate::dispatch::DispatchError;
use crate::web::models::{TopicResponse, WebhookAccepted};
use crate::web::{AppState, error::AppError};

pub fn create_webhook_router(max_payload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/{webhook_key}", post(receive_webhook))
        .route("/{webhook_key}/info", get(webhook_info))
        .layer(DefaultBodyLimit::max(max_payload_bytes))
}

/// Ingress for external producers. Authenticates the presented key against
/// the topic's current webhook key, records the event, then either runs
/// the dispatch pipeline inline (sync topics) or enqueues it on the worker
/// pool (async topics).
async fn receive_webhook(
    State(app_state): State<Arc<AppState>>,
    Path(webhook_key): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let topic = authenticate_topic(&app_state, &webhook_key).await?;

    // Ingress failures reject the event before anything is persisted.
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidPayload(format!("body is not valid JSON: {e}")))?;
    if !payload.is_object() {
        return Err(AppError::InvalidPayload(
            "body must be a JSON object".to_string(),
        ));
    }

    let message = app_state.store.create_message(topic.id, payload).await?;
    info!(
        topic_id = topic.id,
        message_id = message.id,
        mode = %topic.execution_mode,
        "webhook event accepted"
    );

    match topic.execution_mode {
        ExecutionMode::Sync => {
            let report = app_state.dispatcher.dispatch_sync(message.id).await?;
            Ok((StatusCode::OK, Json(serde_json::to_value(&report)?)))
        }
        ExecutionMode::Async => {
            if let Err(err) = app_state.worker_pool.try_enqueue(message.id) {
                // Backpressure: the producer should retry; the event row is
                // closed out so it cannot linger as pending forever.
                let _ = app_state
                    .store
                    .set_message_status(message.id, MessageStatus::Failed)
                    .await;
                return Err(AppError::ServiceUnavailable(err.to_string()));
            }
            let ack = WebhookAccepted {
                message_id: message.id,
                status: "accepted",
                topic: topic.name,
            };
            Ok((StatusCode::ACCEPTED, Json(serde_json::to_value(&ack)?)))
        }
    }
}

/// Topic summary for whoever holds the key.
async fn webhook_info(
    State(app_state): State<Arc<AppState>>,
    Path(webhook_key): Path<String>,
) -> Result<Json<TopicResponse>, AppError> {
    let topic = authenticate_topic(&app_state, &webhook_key).await?;
    Ok(Json(topic.into()))
}

async fn authenticate_topic(app_state: &AppState, presented: &str) -> Result<Topic, AppError> {
    let topic = app_state
        .store
        .topic_by_webhook_key(presented)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid webhook key".to_string()))?;

    // The lookup already matched, but compare in constant time anyway so a
    // hypothetical lookup shortcut can never turn into a timing oracle.
    if !constant_time_compare(presented, &topic.webhook_key) {
        return Err(AppError::Unauthorized("invalid webhook key".to_string()));
    }
    Ok(topic)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Store(e) => e.into(),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
