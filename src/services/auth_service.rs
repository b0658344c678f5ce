use axum::Extension;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use crate::db::models::User;
use crate::db::store::Store;
use crate::web::error::AppError;
use crate::web::models::{
    AuthenticatedUser, Claims, LoginRequest, LoginResponse, RegisterRequest, UserResponse,
};

pub async fn register_user(
    store: &dyn Store,
    req: RegisterRequest,
) -> Result<UserResponse, AppError> {
    if req.username.is_empty() || req.password.len() < 8 {
        return Err(AppError::InvalidInput(
            "username must not be empty and the password needs at least 8 characters".to_string(),
        ));
    }

    if store
        .user_by_username(&req.username)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?
        .is_some()
    {
        return Err(AppError::UserAlreadyExists(
            "username is already taken".to_string(),
        ));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| AppError::PasswordHashingError(e.to_string()))?;

    let user = store
        .create_user(&req.username, &password_hash)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

    Ok(UserResponse {
        id: user.id,
        username: user.username,
    })
}

pub async fn login_user(
    store: &dyn Store,
    req: LoginRequest,
    jwt_secret: &str,
) -> Result<LoginResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "username and password must not be empty".to_string(),
        ));
    }

    let user = store
        .user_by_username(&req.username)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?
        .ok_or(AppError::InvalidCredentials)?;

    let valid = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("password verification failed: {e}")))?;
    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    create_jwt_for_user(&user, jwt_secret)
}

pub fn create_jwt_for_user(user: &User, jwt_secret: &str) -> Result<LoginResponse, AppError> {
    let now = Utc::now();
    let expiration = (now + Duration::hours(24)).timestamp() as usize;

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(e.to_string()))?;

    Ok(LoginResponse {
        token,
        user_id: user.id,
        username: user.username.clone(),
    })
}

pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<axum::Json<UserResponse>, AppError> {
    Ok(axum::Json(UserResponse {
        id: user.id,
        username: user.username,
    }))
}
