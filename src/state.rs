// src/state.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use axum::extract::FromRef;
use tokio::{sync::RwLock, task::JoinHandle, time::Instant};

use crate::{
    auth::AuthService,
    blob::BlobStore,
    catalog::QuizCatalog,
    config::Config,
    error::AppError,
    identity::{IdentityProvider, LocalIdentity},
    profile::ProfileService,
    recorder::{AttemptLogWatch, AttemptRecorder},
    session::SessionHandle,
    store::RemoteStore,
};

/// A running or finished quiz session and the user who started it.
pub struct OwnedSession {
    pub owner: String,
    pub handle: SessionHandle,
}

/// What a signed-in user keeps alive between requests.
pub struct UserContext {
    pub profile: ProfileService,
    pub attempts: AttemptLogWatch,
    last_used: Mutex<Instant>,
}

impl UserContext {
    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_since(&self, cutoff: Instant) -> bool {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) < cutoff
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RemoteStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub catalog: Arc<QuizCatalog>,
    pub recorder: Arc<AttemptRecorder>,
    pub sessions: Arc<RwLock<HashMap<String, Arc<OwnedSession>>>>,
    pub users: Arc<RwLock<HashMap<String, Arc<UserContext>>>>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn RemoteStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let identity = Arc::new(LocalIdentity::new(
            store.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiration,
        ));

        Self {
            catalog: Arc::new(QuizCatalog::new(store.clone())),
            recorder: Arc::new(AttemptRecorder::new(store.clone())),
            identity,
            config,
            store,
            blobs,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A fresh auth flow for one request.
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.identity.clone(),
            self.store.clone(),
            self.config.default_profile_picture_url.clone(),
        )
    }

    /// The user's profile and attempt-log watch, created on first use.
    pub async fn user_context(&self, user_id: &str) -> Result<Arc<UserContext>, AppError> {
        if let Some(ctx) = self.users.read().await.get(user_id) {
            ctx.touch();
            return Ok(ctx.clone());
        }

        let mut users = self.users.write().await;
        if let Some(ctx) = users.get(user_id) {
            ctx.touch();
            return Ok(ctx.clone());
        }

        let ctx = Arc::new(UserContext {
            profile: ProfileService::new(self.store.clone(), self.blobs.clone(), user_id),
            attempts: self.recorder.watch_user(user_id).await?,
            last_used: Mutex::new(Instant::now()),
        });
        users.insert(user_id.to_string(), ctx.clone());
        tracing::debug!(%user_id, "User context created");
        Ok(ctx)
    }

    /// Tears down everything kept for `user_id`: its watches and any sessions
    /// still in memory.
    pub async fn end_user(&self, user_id: &str) {
        if let Some(ctx) = self.users.write().await.remove(user_id) {
            ctx.attempts.reset();
        }
        self.sessions
            .write()
            .await
            .retain(|_, session| session.owner != user_id);
    }

    /// Releases contexts not used for `user_idle_ttl`. They are rebuilt on the
    /// user's next request.
    pub async fn evict_idle_users(&self) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(self.config.user_idle_ttl) else {
            return 0;
        };

        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|user_id, ctx| {
            if ctx.idle_since(cutoff) {
                tracing::debug!(%user_id, "Idle user context evicted");
                ctx.attempts.reset();
                false
            } else {
                true
            }
        });
        before - users.len()
    }

    /// Evicts idle user contexts once per `user_idle_ttl`.
    pub fn spawn_housekeeping(&self) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let period = state.config.user_idle_ttl;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let evicted = state.evict_idle_users().await;
                if evicted > 0 {
                    tracing::info!(evicted, "Released idle user contexts");
                }
            }
        })
    }

    /// Files a new session under a random id. Once it finishes it stays
    /// readable for `finished_session_ttl`, then it is dropped.
    pub async fn register_session(&self, owner: &str, handle: SessionHandle) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let finished = handle.finished_signal();

        self.sessions.write().await.insert(
            session_id.clone(),
            Arc::new(OwnedSession {
                owner: owner.to_string(),
                handle,
            }),
        );

        let sessions = self.sessions.clone();
        let ttl = self.config.finished_session_ttl;
        let id = session_id.clone();
        tokio::spawn(async move {
            // Abandoned sessions are already gone from the map.
            if finished.await.is_none() {
                return;
            }
            tokio::time::sleep(ttl).await;
            if sessions.write().await.remove(&id).is_some() {
                tracing::debug!(session_id = %id, "Finished session dropped");
            }
        });

        session_id
    }

    /// Looks up a session the user owns. Other users' sessions do not exist.
    pub async fn owned_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Arc<OwnedSession>, AppError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|s| s.owner == user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<QuizCatalog> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}
