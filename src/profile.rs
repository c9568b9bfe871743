// src/profile.rs

//! The signed-in user's profile record (`users/{uid}`).

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::watch;

use crate::{
    blob::BlobStore,
    error::AppError,
    models::user::Profile,
    store::RemoteStore,
    utils::html::clean_display_text,
};

pub const UNKNOWN_USER: &str = "Unknown User";

pub fn user_path(user_id: &str) -> String {
    format!("users/{}", user_id)
}

pub fn profile_picture_blob(user_id: &str) -> String {
    format!("profileImages/{}.jpg", user_id)
}

/// Profile state for one user. Every mutation is followed by a read of the
/// stored value so the observed profile matches the record.
pub struct ProfileService {
    store: Arc<dyn RemoteStore>,
    blobs: Arc<dyn BlobStore>,
    user_id: String,
    profile: watch::Sender<Profile>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn RemoteStore>, blobs: Arc<dyn BlobStore>, user_id: &str) -> Self {
        let (profile, _) = watch::channel(Profile {
            user_id: user_id.to_string(),
            ..Default::default()
        });
        Self {
            store,
            blobs,
            user_id: user_id.to_string(),
            profile,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Profile> {
        self.profile.subscribe()
    }

    async fn read_string(&self, field: &str) -> Option<String> {
        let path = format!("{}/{}", user_path(&self.user_id), field);
        match self.store.get_once(&path).await {
            Ok(value) => value.and_then(|v| v.as_str().map(str::to_owned)),
            Err(e) => {
                tracing::error!(%path, "Failed to fetch profile field: {}", e);
                None
            }
        }
    }

    pub async fn fetch_username(&self) -> String {
        let username = self
            .read_string("username")
            .await
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        self.profile.send_modify(|p| p.username = username.clone());
        username
    }

    pub async fn fetch_profile_picture_url(&self) -> String {
        let url = self.read_string("profilePictureUrl").await.unwrap_or_default();
        tracing::debug!(user_id = %self.user_id, %url, "Fetched profile picture URL");
        self.profile.send_modify(|p| p.profile_picture_url = url.clone());
        url
    }

    pub async fn refresh(&self) -> Profile {
        self.fetch_username().await;
        self.fetch_profile_picture_url().await;
        self.profile()
    }

    pub async fn update_username(&self, username: &str) -> Result<Profile, AppError> {
        let username = clean_display_text(username);
        if username.is_empty() {
            return Err(AppError::BadRequest("Username can't be empty".to_string()));
        }

        self.store
            .set_value(
                &format!("{}/username", user_path(&self.user_id)),
                json!(username),
            )
            .await
            .map_err(|e| {
                tracing::error!(user_id = %self.user_id, "Failed to update username: {}", e);
                AppError::from(e)
            })?;

        tracing::info!(user_id = %self.user_id, "Username updated");
        self.fetch_username().await;
        Ok(self.profile())
    }

    /// Uploads the picture to `profileImages/{uid}.jpg` and points the user
    /// record at it.
    pub async fn upload_profile_picture(&self, bytes: Vec<u8>) -> Result<Profile, AppError> {
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Image is empty".to_string()));
        }

        let url = self
            .blobs
            .put_file(&profile_picture_blob(&self.user_id), bytes)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %self.user_id, "Failed to upload image: {}", e);
                AppError::from(e)
            })?;

        let mut fields = Map::new();
        fields.insert("profilePictureUrl".to_string(), Value::String(url));
        self.store
            .update_fields(&user_path(&self.user_id), fields)
            .await
            .map_err(|e| {
                tracing::error!(
                    user_id = %self.user_id,
                    "Failed to update profile picture URL in the database: {}", e
                );
                AppError::from(e)
            })?;

        tracing::info!(user_id = %self.user_id, "Profile picture updated");
        self.fetch_profile_picture_url().await;
        Ok(self.profile())
    }
}
