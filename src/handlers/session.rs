// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::session::{CreateSessionRequest, CreateSessionResponse, SelectRequest},
    navigation::{Route, grade_message},
    session::{QuizSession, SessionContext, SessionState, spawn_session},
    state::AppState,
    utils::jwt::CurrentUser,
};

/// Starts a quiz session for the current user.
///
/// Questions are read from the store. If that fails they come from the
/// catalog entry, and failing that the session starts without them and still
/// runs its clock.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = payload.quiz_id.filter(|id| !id.is_empty());
    let quiz = quiz_id.as_deref().and_then(|id| state.catalog.find(id));

    let questions = match quiz_id.as_deref() {
        Some(id) => state.catalog.questions_for(id).await,
        None => Vec::new(),
    };

    let session = QuizSession::new(
        quiz_id.clone(),
        quiz.as_ref(),
        questions,
        state.config.default_quiz_duration_secs,
    )?;

    let handle = spawn_session(
        session,
        SessionContext {
            recorder: state.recorder.clone(),
            user_id: Some(user.user_id.clone()),
            tick: state.config.tick_interval,
        },
    );

    let session_id = state.register_session(&user.user_id, handle).await;

    tracing::info!(user_id = %user.user_id, %session_id, quiz_id = ?quiz_id, "Quiz session started");

    let route = Route::QuestionScreen {
        quiz_id: quiz_id.unwrap_or_default(),
    };
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            route: route.to_string(),
        }),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.owned_session(&session_id, &user.user_id).await?;
    Ok(Json(session.handle.snapshot()))
}

/// Picks an option. Selections that don't apply are reported as ignored.
pub async fn select_option(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
    Json(payload): Json<SelectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.owned_session(&session_id, &user.user_id).await?;
    let (selection, snapshot) = session
        .handle
        .select(payload.question, payload.option)
        .await?;

    Ok(Json(json!({
        "selection": selection,
        "session": snapshot,
    })))
}

pub async fn advance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.owned_session(&session_id, &user.user_id).await?;
    let snapshot = session.handle.advance().await?;
    Ok(Json(snapshot))
}

/// Where to go once the session is over: the grade screen route plus its headline.
pub async fn get_result(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.owned_session(&session_id, &user.user_id).await?;

    if session.handle.snapshot().state != SessionState::Terminal {
        return Err(AppError::Conflict(
            "Quiz session is still running".to_string(),
        ));
    }

    // Terminal but possibly still handing off the attempt.
    let route = session
        .handle
        .finished()
        .await
        .ok_or_else(|| AppError::InternalServerError("Session ended without a result".to_string()))?;

    let grade = match &route {
        Route::GradesScreen { grade_percentage } => *grade_percentage,
        Route::QuestionScreen { .. } => 0.0,
    };

    Ok(Json(json!({
        "route": route.to_string(),
        "gradePercentage": grade,
        "message": grade_message(grade),
    })))
}
