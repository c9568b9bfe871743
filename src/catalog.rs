// src/catalog.rs

//! In-memory mirror of the `quizzes` subtree.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    models::quiz::{Question, Quiz, children},
    store::{RemoteStore, StoreError},
};

pub const CATALOG_PATH: &str = "quizzes";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogState {
    pub loading: bool,
    pub quizzes: Vec<Quiz>,
}

pub struct QuizCatalog {
    store: Arc<dyn RemoteStore>,
    state: watch::Sender<CatalogState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl QuizCatalog {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let (state, _) = watch::channel(CatalogState::default());
        Self {
            store,
            state,
            task: Mutex::new(None),
        }
    }

    /// Raises `loading`, then keeps the quiz list in sync with the store.
    /// Calling it again while running does nothing.
    pub async fn start(&self) -> Result<(), StoreError> {
        if self.is_running() {
            return Ok(());
        }

        self.state.send_modify(|s| s.loading = true);
        let mut subscription = match self.store.subscribe(CATALOG_PATH).await {
            Ok(sub) => sub,
            Err(e) => {
                self.state.send_modify(|s| s.loading = false);
                return Err(e);
            }
        };
        tracing::debug!("Subscribed to quiz catalog");

        let state = self.state.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    Ok(snapshot) => {
                        let quizzes = snapshot.as_ref().map(decode_catalog).unwrap_or_default();
                        tracing::info!(count = quizzes.len(), "Quiz catalog refreshed");
                        state.send_replace(CatalogState {
                            loading: false,
                            quizzes,
                        });
                    }
                    Err(e) => {
                        tracing::error!("Error fetching quizzes: {}", e);
                        state.send_modify(|s| s.loading = false);
                    }
                }
            }
        });

        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> CatalogState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.state.subscribe()
    }

    pub fn find(&self, quiz_id: &str) -> Option<Quiz> {
        self.state
            .borrow()
            .quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .cloned()
    }

    /// One-shot read of `quizzes/{id}/questions`. Undecodable questions are
    /// skipped; an empty id yields no questions.
    pub async fn fetch_questions(&self, quiz_id: &str) -> Result<Vec<Question>, StoreError> {
        if quiz_id.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self
            .store
            .get_once(&format!("{}/{}/questions", CATALOG_PATH, quiz_id))
            .await?;

        Ok(snapshot.as_ref().map(decode_questions).unwrap_or_default())
    }

    /// Questions to start a session with. A failed read falls back to the
    /// questions carried by the mirrored catalog entry.
    pub async fn questions_for(&self, quiz_id: &str) -> Vec<Question> {
        match self.fetch_questions(quiz_id).await {
            Ok(questions) => questions,
            Err(e) => {
                tracing::error!(%quiz_id, "Failed to fetch questions: {}", e);
                self.find(quiz_id)
                    .map(|quiz| quiz.ordered_questions())
                    .unwrap_or_default()
            }
        }
    }

    /// Writes `catalog` to the store when nothing is there yet.
    pub async fn seed_if_empty(&self, catalog: Value) -> Result<bool, StoreError> {
        if self.store.get_once(CATALOG_PATH).await?.is_some() {
            return Ok(false);
        }
        self.store.set_value(CATALOG_PATH, catalog).await?;
        tracing::info!("Quiz catalog seeded");
        Ok(true)
    }
}

impl Drop for QuizCatalog {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

/// Decodes every quiz record it can. A record without an `id` takes its key.
pub fn decode_catalog(snapshot: &Value) -> Vec<Quiz> {
    children(snapshot)
        .into_iter()
        .filter_map(|(key, record)| match serde_json::from_value::<Quiz>(record.clone()) {
            Ok(mut quiz) => {
                if quiz.id.is_empty() {
                    quiz.id = key;
                }
                Some(quiz)
            }
            Err(e) => {
                tracing::warn!(%key, "Quiz is null or cannot be converted: {}", e);
                None
            }
        })
        .collect()
}

pub fn decode_questions(snapshot: &Value) -> Vec<Question> {
    children(snapshot)
        .into_iter()
        .filter_map(
            |(key, record)| match serde_json::from_value::<Question>(record.clone()) {
                Ok(question) => Some(question),
                Err(e) => {
                    tracing::warn!(%key, "Question cannot be converted: {}", e);
                    None
                }
            },
        )
        .collect()
}
