// src/store/memory.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{
    ChangeFeed, RemoteStore, StoreError, Subscription, get_at, is_empty_node, set_at, split_path,
    update_at,
};

/// In-process store. Used when no `DATABASE_URL` is configured and in tests.
pub struct MemoryStore {
    documents: RwLock<Map<String, Value>>,
    feed: Arc<ChangeFeed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Map::new()),
            feed: ChangeFeed::new(),
        }
    }

    /// Applies `mutate` to the document owning `path` and publishes the result.
    /// `mutate` returns `false` to leave the document untouched.
    async fn write<F>(&self, path: &str, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Value, &[String]) -> bool + Send,
    {
        let segments = split_path(path)?;
        let root = segments[0].clone();

        // Held until after publishing so events go out in write order.
        let mut documents = self.documents.write().await;
        let mut document = documents.get(&root).cloned().unwrap_or(Value::Null);
        if !mutate(&mut document, &segments[1..]) {
            return Ok(false);
        }
        if is_empty_node(&document) {
            document = Value::Null;
        }

        if document.is_null() {
            documents.remove(&root);
        } else {
            documents.insert(root, document.clone());
        }

        self.feed.publish(segments, document);
        Ok(true)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = split_path(path)?;
        let documents = self.documents.read().await;
        Ok(documents
            .get(&segments[0])
            .and_then(|doc| get_at(doc, &segments[1..]))
            .cloned())
    }

    async fn set_value(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.write(path, |doc, rel| {
            set_at(doc, rel, value);
            true
        })
        .await
        .map(|_| ())
    }

    async fn update_fields(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.write(path, |doc, rel| {
            update_at(doc, rel, fields);
            true
        })
        .await
        .map(|_| ())
    }

    async fn create_if_absent(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        self.write(path, |doc, rel| {
            if get_at(doc, rel).is_some() {
                return false;
            }
            set_at(doc, rel, value);
            true
        })
        .await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let segments = split_path(path)?;
        let subscription = self.feed.subscribe(segments);
        let initial = self.get_once(path).await;
        Ok(subscription.with_initial(initial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_returns_written_value() {
        let store = MemoryStore::new();
        store
            .set_value("users/u1", json!({"username": "alice"}))
            .await
            .unwrap();

        assert_eq!(
            store.get_once("users/u1/username").await.unwrap(),
            Some(json!("alice"))
        );
        assert_eq!(store.get_once("users/u2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscription_sees_initial_value_then_changes() {
        let store = MemoryStore::new();
        store.set_value("quizzes/q1/title", json!("Rust")).await.unwrap();

        let mut sub = store.subscribe("quizzes").await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first, Some(json!({"q1": {"title": "Rust"}})));

        store.set_value("quizzes/q2/title", json!("Go")).await.unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(
            second,
            Some(json!({"q1": {"title": "Rust"}, "q2": {"title": "Go"}}))
        );
    }

    #[tokio::test]
    async fn subscription_ignores_unrelated_paths() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("users/u1/quizAttempts").await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), None);

        store.set_value("users/u2/username", json!("bob")).await.unwrap();
        store
            .set_value("users/u1/quizAttempts/k1", json!({"quizId": "q1"}))
            .await
            .unwrap();

        let next = sub.next().await.unwrap().unwrap();
        assert_eq!(next, Some(json!({"k1": {"quizId": "q1"}})));
    }

    #[tokio::test]
    async fn invalid_path_is_rejected() {
        let store = MemoryStore::new();
        let err = store.set_value("users/a.b", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn create_if_absent_keeps_existing_value() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("accounts/a").await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), None);

        assert!(store.create_if_absent("accounts/a", json!({"uid": "1"})).await.unwrap());
        assert!(!store.create_if_absent("accounts/a", json!({"uid": "2"})).await.unwrap());

        assert_eq!(
            store.get_once("accounts/a/uid").await.unwrap(),
            Some(json!("1"))
        );
        assert_eq!(sub.next().await.unwrap().unwrap(), Some(json!({"uid": "1"})));
    }
}
