// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{LoginRequest, RegisterRequest},
    state::AppState,
    utils::jwt::CurrentUser,
};

/// Registers a new user and signs them in.
///
/// Creates the account, then the `users/{uid}` profile record.
/// Returns 201 Created with the bearer token.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let auth = state.auth_service();
    let session = auth
        .signup(&payload.email, &payload.username, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": session.token,
            "userId": session.user_id,
            "state": auth.state(),
        })),
    ))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let auth = state.auth_service();
    let session = auth.login(&payload.email, &payload.password).await?;

    tracing::info!(user_id = %session.user_id, "User logged in");
    Ok(Json(json!({
        "token": session.token,
        "userId": session.user_id,
        "state": auth.state(),
    })))
}

/// Revokes the presented token and drops the user's live state.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service().signout(&user.token).await;
    state.end_user(&user.user_id).await;

    tracing::info!(user_id = %user.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
