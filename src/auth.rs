// src/auth.rs

//! Login/registration flow for one client, with its state observable.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::{
    error::AppError,
    identity::{AuthSession, IdentityProvider},
    models::user::UserRecord,
    profile::user_path,
    store::RemoteStore,
    utils::html::clean_display_text,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
    Loading,
    Error(String),
}

pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn RemoteStore>,
    default_profile_picture_url: String,
    state: watch::Sender<AuthState>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn RemoteStore>,
        default_profile_picture_url: String,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            identity,
            store,
            default_profile_picture_url,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Flags `message` on the state and hands back the matching error.
    fn fail(&self, err: AppError, message: String) -> AppError {
        self.state.send_replace(AuthState::Error(message));
        err
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        if email.is_empty() || password.is_empty() {
            let msg = "Email or password can't be empty".to_string();
            return Err(self.fail(AppError::BadRequest(msg.clone()), msg));
        }

        self.state.send_replace(AuthState::Loading);
        match self.identity.sign_in(email, password).await {
            Ok(session) => {
                self.state.send_replace(AuthState::Authenticated);
                Ok(session)
            }
            Err(e) => {
                let msg = e.to_string();
                Err(self.fail(AppError::from(e), msg))
            }
        }
    }

    /// Creates the account, then the `users/{uid}` record with the default picture.
    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, AppError> {
        if username.is_empty() || password.is_empty() || email.is_empty() {
            let msg = "Email, username, or password can't be empty".to_string();
            return Err(self.fail(AppError::BadRequest(msg.clone()), msg));
        }

        self.state.send_replace(AuthState::Loading);
        let session = match self.identity.sign_up(email, password).await {
            Ok(session) => session,
            Err(e) => {
                let msg = e.to_string();
                return Err(self.fail(AppError::from(e), msg));
            }
        };

        let record = UserRecord {
            email: email.trim().to_string(),
            username: clean_display_text(username),
            uid: session.user_id.clone(),
            profile_picture_url: self.default_profile_picture_url.clone(),
        };
        let record = serde_json::to_value(&record)?;

        if let Err(e) = self.store.set_value(&user_path(&session.user_id), record).await {
            tracing::error!(uid = %session.user_id, "Failed to save user data: {}", e);
            let msg = format!("Failed to save user data: {}", e);
            return Err(self.fail(AppError::from(e), msg));
        }

        tracing::info!(uid = %session.user_id, "User registered");
        self.state.send_replace(AuthState::Authenticated);
        Ok(session)
    }

    pub async fn signout(&self, token: &str) {
        self.identity.sign_out(token).await;
        self.state.send_replace(AuthState::Unauthenticated);
    }

    /// Drops an error back to `Unauthenticated`; other states stay.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, AuthState::Error(_)) {
                *state = AuthState::Unauthenticated;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{identity::LocalIdentity, store::MemoryStore};

    fn service() -> (AuthService, Arc<dyn RemoteStore>) {
        let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
        let identity = Arc::new(LocalIdentity::new(store.clone(), "secret".into(), 600));
        let auth = AuthService::new(identity, store.clone(), "http://cdn.test/blobs/profile.png".into());
        (auth, store)
    }

    #[tokio::test]
    async fn empty_fields_set_error_without_backend_call() {
        let (auth, _) = service();

        assert!(auth.login("", "pw").await.is_err());
        assert_eq!(
            auth.state(),
            AuthState::Error("Email or password can't be empty".into())
        );

        assert!(auth.signup("a@b.io", "", "password").await.is_err());
        assert_eq!(
            auth.state(),
            AuthState::Error("Email, username, or password can't be empty".into())
        );

        auth.clear_error();
        assert_eq!(auth.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn signup_writes_user_record() {
        let (auth, store) = service();
        let session = auth.signup("ada@example.com", "ada", "password123").await.unwrap();
        assert_eq!(auth.state(), AuthState::Authenticated);

        let record = store
            .get_once(&format!("users/{}", session.user_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record["username"], "ada");
        assert_eq!(record["uid"], session.user_id.as_str());
        assert_eq!(record["profilePictureUrl"], "http://cdn.test/blobs/profile.png");
    }

    #[tokio::test]
    async fn login_failure_surfaces_message() {
        let (auth, _) = service();
        auth.signup("ada@example.com", "ada", "password123").await.unwrap();

        let err = auth.login("ada@example.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
        assert!(matches!(auth.state(), AuthState::Error(_)));

        auth.login("ada@example.com", "password123").await.unwrap();
        assert_eq!(auth.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn signout_returns_to_unauthenticated() {
        let (auth, _) = service();
        let session = auth.signup("ada@example.com", "ada", "password123").await.unwrap();
        auth.signout(&session.token).await;
        assert_eq!(auth.state(), AuthState::Unauthenticated);

        auth.clear_error();
        assert_eq!(auth.state(), AuthState::Unauthenticated);
    }
}
