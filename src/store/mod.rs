// src/store/mod.rs

//! Path-addressed document store.
//!
//! Everything durable (user records, the quiz catalog, attempt logs, credentials)
//! lives in one JSON tree addressed by `/`-separated paths such as
//! `users/{uid}/quizAttempts/{key}`. Each top-level segment is a separate
//! document so backends can lock and persist it independently.
//!
//! Writes fan out as [`Change`] events through a [`ChangeFeed`]. A
//! [`Subscription`] filters those down to the ones touching its own path and
//! hands out whole-value snapshots.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Buffered change events per store before slow subscribers start lagging.
pub const CHANGE_BUFFER: usize = 256;

/// A path segment may not be empty and may not contain `.`, `#`, `$`, `[`, `]` or `/`.
static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^./#$\[\]]+$").expect("segment pattern is valid"));

#[derive(Debug, Clone)]
pub enum StoreError {
    /// The path is empty or one of its segments is not a legal key.
    InvalidPath(String),
    /// The backend rejected or failed the operation.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidPath(path) => write!(f, "invalid store path '{}'", path),
            StoreError::Backend(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Remote data store capability.
///
/// Mirrors the operations the application issues against its managed backend:
/// point reads, point writes, field merges, subscriptions, and push keys.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the value at `path` once. `None` when nothing is stored there.
    async fn get_once(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value at `path`. Writing `null` deletes the node.
    async fn set_value(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merges `fields` into the object at `path`, leaving other children alone.
    async fn update_fields(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Writes `value` at `path` only if nothing is stored there yet.
    /// Returns whether the write happened. Check and write are one atomic step.
    async fn create_if_absent(&self, path: &str, value: Value) -> Result<bool, StoreError>;

    /// Subscribes to `path`. The first event is the current value.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Generates a fresh child key under `path` without writing anything.
    /// Keys sort in generation order.
    fn push_unique_key(&self, path: &str) -> Result<String, StoreError> {
        split_path(path)?;
        Ok(next_push_key())
    }
}

/// Splits and validates a store path.
pub fn split_path(path: &str) -> Result<Vec<String>, StoreError> {
    let segments: Vec<String> = path
        .trim_matches('/')
        .split('/')
        .map(str::to_owned)
        .collect();

    if segments.iter().any(|s| !SEGMENT_RE.is_match(s)) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }

    Ok(segments)
}

/// Whether `key` is usable as a single path segment.
pub fn is_valid_key(key: &str) -> bool {
    SEGMENT_RE.is_match(key)
}

static PUSH_STATE: LazyLock<Mutex<(u64, u32)>> = LazyLock::new(|| Mutex::new((0, 0)));

/// Chronologically sortable unique key: hex millis, a per-millisecond sequence,
/// then random bits so keys from different processes do not collide.
fn next_push_key() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let (millis, seq) = {
        let mut state = PUSH_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if now > state.0 {
            *state = (now, 0);
        } else {
            state.1 += 1;
        }
        *state
    };

    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{:012x}{:06x}{}", millis, seq, &random[..8])
}

/// One committed write: the path it touched plus the whole top-level
/// document as it looks afterwards.
#[derive(Debug, Clone)]
pub struct Change {
    pub path: Vec<String>,
    pub document: Arc<Value>,
}

impl Change {
    /// A write touches a subscription when one path is a prefix of the other.
    fn touches(&self, path: &[String]) -> bool {
        let shared = self.path.len().min(path.len());
        self.path[..shared] == path[..shared]
    }

    fn snapshot_at(&self, path: &[String]) -> Option<Value> {
        get_at(&self.document, &path[1..]).cloned()
    }
}

/// Fan-out of committed writes, shared by a store and its subscriptions.
///
/// Besides broadcasting each [`Change`] it remembers the last published
/// version of every document, so a subscription that fell behind can jump
/// straight to the current value.
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
    latest: Mutex<HashMap<String, Arc<Value>>>,
}

impl ChangeFeed {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(CHANGE_BUFFER);
        Arc::new(Self {
            sender,
            latest: Mutex::new(HashMap::new()),
        })
    }

    /// Publishes `document` as the new state of the root `path` points into.
    /// Callers must publish in commit order.
    pub fn publish(&self, path: Vec<String>, document: Value) {
        let document = Arc::new(document);
        let mut latest = self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        latest.insert(path[0].clone(), document.clone());
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.sender.send(Change { path, document });
    }

    /// Opens a subscription. Call this *before* reading the initial value so
    /// no write can slip between the two.
    pub fn subscribe(self: &Arc<Self>, path: Vec<String>) -> Subscription {
        Subscription {
            path,
            initial: None,
            changes: self.sender.subscribe(),
            feed: self.clone(),
        }
    }

    fn latest(&self, root: &str) -> Option<Arc<Value>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(root)
            .cloned()
    }
}

pub type SubscriptionEvent = Result<Option<Value>, StoreError>;

/// Live view on one path. Dropping it unsubscribes.
pub struct Subscription {
    path: Vec<String>,
    initial: Option<SubscriptionEvent>,
    changes: broadcast::Receiver<Change>,
    feed: Arc<ChangeFeed>,
}

impl Subscription {
    pub(crate) fn with_initial(mut self, initial: SubscriptionEvent) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn path(&self) -> String {
        self.path.join("/")
    }

    /// Waits for the next snapshot. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.changes.recv().await {
                Ok(change) => {
                    if change.touches(&self.path) {
                        return Some(Ok(change.snapshot_at(&self.path)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(path = %self.path(), skipped, "Subscription lagged behind");
                    // Whatever was missed, the latest document already contains it.
                    if let Some(document) = self.feed.latest(&self.path[0]) {
                        return Some(Ok(get_at(&document, &self.path[1..]).cloned()));
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Reads the node at `path` relative to `root`.
pub(crate) fn get_at<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() { None } else { Some(node) }
}

/// Writes `value` at `path` relative to `root`, creating intermediate objects.
/// `null` removes the node and prunes parents left empty.
pub(crate) fn set_at(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = if is_empty_node(&value) { Value::Null } else { value };
        return;
    };

    if is_empty_node(&value) {
        remove_at(root, parents, last);
        return;
    }

    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.clone(), value);
}

/// Merges every field into the object at `path`.
pub(crate) fn update_at(root: &mut Value, path: &[String], fields: Map<String, Value>) {
    for (key, value) in fields {
        let mut child = path.to_vec();
        child.push(key);
        set_at(root, &child, value);
    }
}

fn remove_at(node: &mut Value, parents: &[String], last: &str) -> bool {
    let Some(map) = node.as_object_mut() else {
        return false;
    };

    match parents.split_first() {
        None => {
            map.remove(last);
        }
        Some((head, rest)) => {
            if let Some(child) = map.get_mut(head) {
                if remove_at(child, rest, last) {
                    map.remove(head);
                }
            }
        }
    }

    map.is_empty()
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

pub(crate) fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
