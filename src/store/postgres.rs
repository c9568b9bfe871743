// src/store/postgres.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, types::Json};
use tokio::sync::Mutex;

use super::{
    ChangeFeed, RemoteStore, StoreError, Subscription, get_at, is_empty_node, set_at, split_path,
    update_at,
};

/// Postgres-backed store.
///
/// Each top-level segment is one JSONB row in `documents`. Writes lock the row,
/// mutate it in memory, and write it back inside one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    feed: Arc<ChangeFeed>,
    /// Serializes commit + publish within this process, so subscribers see
    /// documents in commit order.
    publish_order: Arc<Mutex<()>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
            publish_order: Arc::new(Mutex::new(())),
        }
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn load(&self, root: &str) -> Result<Value, StoreError> {
        let body: Option<Json<Value>> =
            sqlx::query_scalar("SELECT body FROM documents WHERE root = $1")
                .bind(root)
                .fetch_optional(&self.pool)
                .await?;

        Ok(body.map(|Json(v)| v).unwrap_or(Value::Null))
    }

    /// `mutate` returns `false` to leave the document untouched; the
    /// transaction is then rolled back.
    async fn write<F>(&self, path: &str, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Value, &[String]) -> bool + Send,
    {
        let segments = split_path(path)?;
        let root = segments[0].clone();

        let _order = self.publish_order.lock().await;
        let mut tx = self.pool.begin().await?;

        // Make sure the row exists so concurrent writers serialize on its lock.
        sqlx::query("INSERT INTO documents (root, body) VALUES ($1, '{}'::jsonb) ON CONFLICT (root) DO NOTHING")
            .bind(&root)
            .execute(&mut *tx)
            .await?;

        let Json(mut document): Json<Value> =
            sqlx::query_scalar("SELECT body FROM documents WHERE root = $1 FOR UPDATE")
                .bind(&root)
                .fetch_one(&mut *tx)
                .await?;

        if !mutate(&mut document, &segments[1..]) {
            tx.rollback().await?;
            return Ok(false);
        }
        if is_empty_node(&document) {
            document = Value::Null;
        }

        if document.is_null() {
            sqlx::query("DELETE FROM documents WHERE root = $1")
                .bind(&root)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                "UPDATE documents SET body = $2, updated_at = CURRENT_TIMESTAMP WHERE root = $1",
            )
            .bind(&root)
            .bind(Json(&document))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.feed.publish(segments, document);
        Ok(true)
    }
}

#[async_trait]
impl RemoteStore for PgStore {
    async fn get_once(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = split_path(path)?;
        let document = self.load(&segments[0]).await?;
        Ok(get_at(&document, &segments[1..]).cloned())
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
        if let Err(e) = &initial {
            tracing::error!(path, "Initial subscription read failed: {}", e);
        }
        Ok(subscription.with_initial(initial))
    }
}
