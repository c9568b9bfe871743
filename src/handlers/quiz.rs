// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{catalog::QuizCatalog, error::AppError};

/// Current catalog state: the quiz list and whether the first load is still pending.
pub async fn list_quizzes(State(catalog): State<Arc<QuizCatalog>>) -> impl IntoResponse {
    Json(catalog.snapshot())
}

/// Questions of one quiz, read straight from the store.
pub async fn get_questions(
    State(catalog): State<Arc<QuizCatalog>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let questions = catalog.fetch_questions(&quiz_id).await?;
    Ok(Json(questions))
}
