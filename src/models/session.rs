// src/models/session.rs

use serde::{Deserialize, Serialize};

/// DTO for starting a quiz session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Missing ids are tolerated: the session runs its timer and scores 0.
    pub quiz_id: Option<String>,
}

/// DTO for picking an option.
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    /// Index of the question the option belongs to.
    pub question: usize,
    pub option: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub route: String,
}
