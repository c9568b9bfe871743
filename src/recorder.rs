// src/recorder.rs

//! Attempt log: appends finished attempts under `users/{uid}/quizAttempts` and
//! derives the profile-page metrics from it.

use std::{collections::HashSet, sync::Arc};

use serde_json::Value;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};

use crate::{
    models::{
        attempt::{AttemptHistory, QuizAttempt},
        quiz::children,
    },
    store::{RemoteStore, StoreError},
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn attempts_path(user_id: &str) -> String {
    format!("users/{}/quizAttempts", user_id)
}

/// Result of one `record` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Written under this key.
    Recorded(String),
    /// A required field was missing; nothing was written.
    Skipped,
    /// The write failed. The attempt sits in the outbox.
    Failed(String),
}

/// An attempt whose write failed, kept with the key it was meant to land on.
#[derive(Debug, Clone)]
pub struct PendingAttempt {
    pub user_id: String,
    pub key: Option<String>,
    pub attempt: QuizAttempt,
}

pub struct AttemptRecorder {
    store: Arc<dyn RemoteStore>,
    outbox: Mutex<Vec<PendingAttempt>>,
}

impl AttemptRecorder {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Appends one attempt stamped with the current local time.
    ///
    /// Missing or empty inputs make this a silent no-op. Write failures are
    /// logged and parked in the outbox; they are never retried on their own.
    pub async fn record(
        &self,
        user_id: Option<&str>,
        quiz_id: Option<&str>,
        quiz_title: Option<&str>,
        grade_percentage: Option<u32>,
    ) -> RecordOutcome {
        let (Some(user_id), Some(quiz_id), Some(quiz_title), Some(grade_percentage)) = (
            user_id.filter(|s| !s.is_empty()),
            quiz_id.filter(|s| !s.is_empty()),
            quiz_title.filter(|s| !s.is_empty()),
            grade_percentage,
        ) else {
            tracing::debug!("Attempt not recorded: missing user, quiz, title or grade");
            return RecordOutcome::Skipped;
        };

        tracing::debug!(%user_id, %quiz_id, "Logging quiz completion");

        let attempt = QuizAttempt {
            quiz_id: quiz_id.to_string(),
            quiz_title: quiz_title.to_string(),
            grade_percentage,
            completion_time: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };

        let mut pending = PendingAttempt {
            user_id: user_id.to_string(),
            key: None,
            attempt,
        };

        match self.write(&mut pending).await {
            Ok(key) => {
                tracing::info!(%user_id, %key, "Quiz completion logged");
                RecordOutcome::Recorded(key)
            }
            Err(e) => {
                tracing::error!(%user_id, "Failed to log quiz completion: {}", e);
                self.outbox.lock().await.push(pending);
                RecordOutcome::Failed(e.to_string())
            }
        }
    }

    /// Writes under the attempt's key, generating one the first time.
    async fn write(&self, pending: &mut PendingAttempt) -> Result<String, StoreError> {
        let log = attempts_path(&pending.user_id);
        let key = match &pending.key {
            Some(key) => key.clone(),
            None => {
                let key = self.store.push_unique_key(&log)?;
                pending.key = Some(key.clone());
                key
            }
        };

        let value = serde_json::to_value(&pending.attempt)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store
            .set_value(&format!("{}/{}", log, key), value)
            .await?;
        Ok(key)
    }

    /// Attempts whose write failed and have not been retried successfully.
    pub async fn pending(&self) -> Vec<PendingAttempt> {
        self.outbox.lock().await.clone()
    }

    /// Retries every parked attempt once. Returns how many made it.
    /// Each keeps its original key, so a retry never duplicates an entry.
    pub async fn retry_pending(&self) -> usize {
        let parked = std::mem::take(&mut *self.outbox.lock().await);
        let mut still_failing = Vec::new();
        let mut written = 0;

        for mut pending in parked {
            match self.write(&mut pending).await {
                Ok(_) => written += 1,
                Err(e) => {
                    tracing::warn!(user_id = %pending.user_id, "Retry failed: {}", e);
                    still_failing.push(pending);
                }
            }
        }

        self.outbox.lock().await.extend(still_failing);
        written
    }

    /// One-shot read of a user's attempt log.
    pub async fn fetch_attempts(&self, user_id: &str) -> Result<AttemptHistory, StoreError> {
        let snapshot = self.store.get_once(&attempts_path(user_id)).await?;
        Ok(snapshot.as_ref().map(decode_history).unwrap_or_default())
    }

    pub async fn watch_user(&self, user_id: &str) -> Result<AttemptLogWatch, StoreError> {
        AttemptLogWatch::start(self.store.clone(), user_id).await
    }
}

/// Rebuilds the history from a full snapshot of the attempt log.
///
/// Records missing any field are left out of the list but still count toward
/// the distinct-quiz metric if they carry a `quizId`.
pub fn decode_history(snapshot: &Value) -> AttemptHistory {
    let mut attempts = Vec::new();
    let mut unique_quizzes = HashSet::new();

    for (key, record) in children(snapshot) {
        if let Some(quiz_id) = record.get("quizId").and_then(Value::as_str) {
            unique_quizzes.insert(quiz_id.to_string());
        }

        match serde_json::from_value::<QuizAttempt>(record.clone()) {
            Ok(attempt) => attempts.push(attempt),
            Err(e) => tracing::warn!(%key, "Skipping malformed quiz attempt: {}", e),
        }
    }

    AttemptHistory {
        attempts,
        completed_unique_quiz_count: unique_quizzes.len(),
    }
}

/// Live view on one user's attempt log. Dropping it stops the subscription.
pub struct AttemptLogWatch {
    history: watch::Sender<AttemptHistory>,
    task: JoinHandle<()>,
}

impl AttemptLogWatch {
    /// Subscribes to the user's attempt log and recomputes the history on
    /// every change. The current log is loaded by the time this returns.
    pub async fn start(store: Arc<dyn RemoteStore>, user_id: &str) -> Result<Self, StoreError> {
        let mut subscription = store.subscribe(&attempts_path(user_id)).await?;

        // The first event is the current log; take it before returning.
        let initial = match subscription.next().await {
            Some(Ok(snapshot)) => snapshot.as_ref().map(decode_history).unwrap_or_default(),
            Some(Err(e)) => return Err(e),
            None => AttemptHistory::default(),
        };
        let (history, _) = watch::channel(initial);
        let tx = history.clone();
        let user_id = user_id.to_string();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    Ok(snapshot) => {
                        let next = snapshot.as_ref().map(decode_history).unwrap_or_default();
                        tracing::debug!(
                            %user_id,
                            unique = next.completed_unique_quiz_count,
                            "Attempt log refreshed"
                        );
                        tx.send_replace(next);
                    }
                    Err(e) => {
                        tracing::error!(%user_id, "Error fetching quiz attempts: {}", e);
                    }
                }
            }
        });

        Ok(Self { history, task })
    }

    pub fn history(&self) -> AttemptHistory {
        self.history.borrow().clone()
    }

    pub fn completed_unique_quiz_count(&self) -> usize {
        self.history.borrow().completed_unique_quiz_count
    }

    pub fn subscribe(&self) -> watch::Receiver<AttemptHistory> {
        self.history.subscribe()
    }

    /// Stops following the log and empties the observed history.
    pub fn reset(&self) {
        self.task.abort();
        self.history.send_replace(AttemptHistory::default());
    }
}

impl Drop for AttemptLogWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
