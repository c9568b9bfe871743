// src/identity.rs

//! Session/identity capability: email + password accounts.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use validator::ValidateEmail;

use crate::{
    store::{RemoteStore, StoreError, is_valid_key},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{sign_jwt, verify_jwt},
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;

const BAD_CREDENTIALS: &str = "The supplied auth credential is incorrect, malformed or has expired.";

/// Identity failures. Every variant renders as a human-readable message.
#[derive(Debug, Clone)]
pub enum IdentityError {
    /// The request was refused (bad credentials, malformed email, weak password).
    Rejected(String),
    /// The email already belongs to an account.
    EmailInUse,
    /// Something broke on our side.
    Internal(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::Rejected(msg) => write!(f, "{}", msg),
            IdentityError::EmailInUse => {
                write!(f, "The email address is already in use by another account.")
            }
            IdentityError::Internal(msg) => write!(f, "An internal error has occurred. [ {} ]", msg),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        IdentityError::Internal(err.to_string())
    }
}

/// A signed-in user and the bearer token that proves it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user_id: String,
    pub token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_out(&self, token: &str);

    /// The user a token belongs to, if it is valid and not signed out.
    async fn current_user_id(&self, token: &str) -> Option<String>;
}

/// Stored under `accounts/{emailKey}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

/// Accounts kept in the document store, sessions as signed JWTs.
pub struct LocalIdentity {
    store: Arc<dyn RemoteStore>,
    jwt_secret: String,
    jwt_expiration: u64,
    /// Signed-out token ids and when each token expires.
    revoked: RwLock<HashMap<String, usize>>,
}

impl LocalIdentity {
    pub fn new(store: Arc<dyn RemoteStore>, jwt_secret: String, jwt_expiration: u64) -> Self {
        Self {
            store,
            jwt_secret,
            jwt_expiration,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    fn issue(&self, user_id: String) -> Result<AuthSession, IdentityError> {
        let token = sign_jwt(&user_id, &self.jwt_secret, self.jwt_expiration)?;
        Ok(AuthSession { user_id, token })
    }
}

/// Matches the default leeway `jsonwebtoken` allows past `exp`.
const EXPIRY_LEEWAY_SECS: usize = 60;

fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

/// Emails become keys: lowercased, `.` swapped for `,`.
fn account_path(email: &str) -> Result<String, IdentityError> {
    let key = email.trim().to_lowercase().replace('.', ",");
    if !email.trim().to_string().validate_email() || !is_valid_key(&key) {
        return Err(IdentityError::Rejected(
            "The email address is badly formatted.".to_string(),
        ));
    }
    Ok(format!("accounts/{}", key))
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let path = account_path(email)?;

        let account: Account = match self.store.get_once(&path).await? {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                tracing::error!(%path, "Account record is malformed: {}", e);
                IdentityError::Internal(e.to_string())
            })?,
            None => return Err(IdentityError::Rejected(BAD_CREDENTIALS.to_string())),
        };

        if !verify_password(password, &account.password_hash)? {
            return Err(IdentityError::Rejected(BAD_CREDENTIALS.to_string()));
        }

        tracing::info!(uid = %account.uid, "User signed in");
        self.issue(account.uid)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let path = account_path(email)?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Rejected(format!(
                "The given password is invalid. [ Password should be at least {} characters ]",
                MIN_PASSWORD_LEN
            )));
        }

        // Cheap early answer; the conditional write below is what decides.
        if self.store.get_once(&path).await?.is_some() {
            return Err(IdentityError::EmailInUse);
        }

        let uid = uuid::Uuid::new_v4().simple().to_string();
        let account = Account {
            uid: uid.clone(),
            email: email.trim().to_string(),
            password_hash: hash_password(password)?,
        };
        let record =
            serde_json::to_value(&account).map_err(|e| IdentityError::Internal(e.to_string()))?;
        if !self.store.create_if_absent(&path, record).await? {
            return Err(IdentityError::EmailInUse);
        }

        tracing::info!(%uid, "Account created");
        self.issue(uid)
    }

    async fn sign_out(&self, token: &str) {
        // Tokens that no longer verify are rejected anyway.
        let Ok(claims) = verify_jwt(token, &self.jwt_secret) else {
            return;
        };

        let now = unix_now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp + EXPIRY_LEEWAY_SECS >= now);
        revoked.insert(claims.jti, claims.exp);
    }

    async fn current_user_id(&self, token: &str) -> Option<String> {
        let claims = verify_jwt(token, &self.jwt_secret).ok()?;
        if self.revoked.read().await.contains_key(&claims.jti) {
            return None;
        }
        Some(claims.sub)
    }
}
