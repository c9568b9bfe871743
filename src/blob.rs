// src/blob.rs

use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use url::Url;

use crate::store::is_valid_key;

#[derive(Debug)]
pub enum BlobError {
    InvalidPath(String),
    Io(String),
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::InvalidPath(path) => write!(f, "invalid blob path '{}'", path),
            BlobError::Io(msg) => write!(f, "blob write failed: {}", msg),
        }
    }
}

impl std::error::Error for BlobError {}

/// File storage for user uploads (profile pictures).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` at `path`, replacing any previous file, and returns its public URL.
    async fn put_file(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError>;
}

/// Writes blobs to a local directory that the router serves under `/blobs`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: Url,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base: Url) -> Self {
        Self {
            root: root.into(),
            public_base,
        }
    }

    pub fn url_for(&self, path: &str) -> Result<String, BlobError> {
        self.public_base
            .join(&format!("blobs/{}", path))
            .map(|u| u.to_string())
            .map_err(|e| BlobError::InvalidPath(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_file(&self, path: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        // Same key rules as the document store; also rules out `..` traversal.
        let segments: Vec<&str> = path.split('/').collect();
        let Some((file, dirs)) = segments.split_last() else {
            return Err(BlobError::InvalidPath(path.to_string()));
        };
        let file_ok = file
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| is_valid_key(stem) && is_valid_key(ext));
        if !file_ok || dirs.iter().any(|d| !is_valid_key(d)) {
            return Err(BlobError::InvalidPath(path.to_string()));
        }

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io(e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;

        tracing::debug!(path, "Blob stored");
        self.url_for(path)
    }
}
