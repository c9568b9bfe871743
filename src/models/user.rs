// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Stored at `users/{uid}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRecord {
    pub email: String,
    pub username: String,
    pub uid: String,
    pub profile_picture_url: String,
}

/// What the profile page shows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub profile_picture_url: String,
}

/// DTO for registration. Empty fields are reported by the auth flow itself.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(max = 254, message = "Email is too long."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "Username must be at most 50 characters."))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 128, message = "Password must be at most 128 characters."))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(max = 254))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub password: String,
}

/// DTO for renaming.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUsernameRequest {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Username length must be between 1 and 50 characters."
    ))]
    pub username: String,
}
