use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::store::Store;
use crate::dispatch::{DispatchService, DispatchWorkerPool};
use crate::server::config::ServerConfig;
use crate::services::{auth_service, message_service};
use crate::web::{
    error::AppError,
    middleware::auth,
    models::{AuthenticatedUser, LoginRequest, RegisterRequest},
    routes::{channel_routes, routing_routes, topic_routes, webhook_routes},
};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub dispatcher: Arc<DispatchService>,
    pub worker_pool: Arc<DispatchWorkerPool>,
    pub config: Arc<ServerConfig>,
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<models::UserResponse>, AppError> {
    let user = auth_service::register_user(app_state.store.as_ref(), payload).await?;
    Ok(Json(user))
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login_response =
        auth_service::login_user(app_state.store.as_ref(), payload, &app_state.config.jwt_secret)
            .await?;

    let auth_cookie = Cookie::build(("token", login_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    let mut response = Json(login_response).into_response();
    let cookie_value = HeaderValue::from_str(&auth_cookie.to_string())
        .map_err(|e| AppError::InternalServerError(format!("cannot build auth cookie: {e}")))?;
    response.headers_mut().insert(header::SET_COOKIE, cookie_value);
    Ok(response)
}

async fn health_check_handler() -> &'static str {
    "OK"
}

async fn message_deliveries_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let records =
        message_service::deliveries_for_message(app_state.store.as_ref(), user.id, id).await?;
    Ok(Json(records))
}

pub fn create_axum_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route(
            "/api/auth/me",
            get(auth_service::me)
                .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth::auth)),
        )
        .nest(
            "/webhook",
            webhook_routes::create_webhook_router(state.config.max_payload_bytes),
        )
        .nest(
            "/api/channels",
            channel_routes::create_channel_router()
                .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth::auth)),
        )
        .nest(
            "/api/topics",
            topic_routes::create_topic_router()
                .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth::auth)),
        )
        .nest(
            "/api/routings",
            routing_routes::create_routing_router()
                .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth::auth)),
        )
        .route(
            "/api/messages/{id}/deliveries",
            get(message_deliveries_handler)
                .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth::auth)),
        )
        .with_state(state)
        .layer(cors)
}
