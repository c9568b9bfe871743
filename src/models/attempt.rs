// src/models/attempt.rs

use serde::{Deserialize, Serialize};

/// One finished pass through a quiz, stored under
/// `users/{uid}/quizAttempts/{key}`. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub quiz_id: String,

    /// Title as it was when the attempt finished.
    pub quiz_title: String,

    /// 0-100, truncated.
    pub grade_percentage: u32,

    /// Local wall-clock time, `yyyy-MM-dd HH:mm:ss`.
    #[serde(rename = "timestamp")]
    pub completion_time: String,
}

/// Profile-page view of the attempt log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptHistory {
    pub attempts: Vec<QuizAttempt>,
    pub completed_unique_quiz_count: usize,
}
