//! Authentication routes

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use parley_shared::PublicUser;

use crate::{
    auth::{hash_password, verify_password},
    error::{ApiError, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: PublicUser,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
}

// =============================================================================
// Handlers
// =============================================================================

fn validate_username(username: &str) -> ApiResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("Username cannot be empty".to_string()));
    }
    if username.len() > 32 {
        return Err(ApiError::Validation(
            "Username cannot exceed 32 characters".to_string(),
        ));
    }
    Ok(username)
}

/// Register a new user and issue a session token
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let username = validate_username(&req.username)?;
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    // Unique violation maps to UsernameTaken via From<sqlx::Error>
    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(username)
    .bind(&password_hash)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %user_id, username = %username, "User registered");

    issue_token(&state, user_id, username)
}

/// Log in an existing user and issue a session token
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash FROM users WHERE username = $1",
    )
    .bind(req.username.trim())
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::InvalidCredentials)?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!(error = %e, "Password verification failed");
        ApiError::Internal
    })?;

    if !valid {
        tracing::warn!(username = %user.username, "Login failed: bad password");
        return Err(ApiError::InvalidCredentials);
    }

    tracing::info!(user_id = %user.id, username = %user.username, "User logged in");

    issue_token(&state, user.id, &user.username)
}

fn issue_token(state: &AppState, user_id: Uuid, username: &str) -> ApiResult<Json<AuthResponse>> {
    let access_token = state.jwt.generate_token(user_id, username).map_err(|e| {
        tracing::error!(error = %e, "Token generation failed");
        ApiError::Internal
    })?;

    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.token_expiry_seconds(),
        user: PublicUser {
            id: user_id,
            username: username.to_string(),
        },
    }))
}
