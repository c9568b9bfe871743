// src/handlers/profile.rs

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::UpdateUsernameRequest,
    state::AppState,
    utils::jwt::CurrentUser,
};

/// Get current user's profile and quiz statistics.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = state.user_context(&user.user_id).await?;
    let profile = ctx.profile.refresh().await;

    Ok(Json(json!({
        "userId": profile.user_id,
        "username": profile.username,
        "profilePictureUrl": profile.profile_picture_url,
        "completedUniqueQuizCount": ctx.attempts.completed_unique_quiz_count(),
    })))
}

pub async fn update_username(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let ctx = state.user_context(&user.user_id).await?;
    let profile = ctx.profile.update_username(&payload.username).await?;
    Ok(Json(profile))
}

/// Replaces the profile picture with the raw request body.
pub async fn upload_picture(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let ctx = state.user_context(&user.user_id).await?;
    let profile = ctx.profile.upload_profile_picture(body.to_vec()).await?;
    Ok(Json(profile))
}

/// The user's attempt log, oldest first.
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.recorder.fetch_attempts(&user.user_id).await?;
    Ok(Json(history))
}
