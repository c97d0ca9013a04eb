//! Session manager: login, register, logout, token refresh, profile load.
//!
//! ARCHITECTURE
//! ============
//! The session owns the current user and the access/refresh token pair.
//! Tokens are mirrored to `TokenStorage` on every change and the access
//! token is installed as the shared `ApiClient` bearer, so the task store is
//! authenticated as soon as the session is.
//!
//! ERROR HANDLING
//! ==============
//! No operation fails past its boundary: login/register report
//! `Err(message)`, refresh/profile report `false`, logout always completes
//! the local wipe. A storage write failure is logged and ignored; the
//! in-memory session stays authoritative for this process.
//!
//! RECOVERY
//! ========
//! A 401 from the profile endpoint is the only recovered failure: refresh
//! the access token once, then retry the profile read once.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::net::api::{self, ApiClient, ApiError, LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::net::types::{AuthResponse, RefreshResponse, User};
use crate::storage::{REFRESH_TOKEN_KEY, TOKEN_KEY, TokenStorage};

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

/// Profile reads retried after a successful refresh, per `load_user` call.
pub const MAX_PROFILE_RETRIES: usize = 1;

#[derive(Debug, Clone, Default)]
struct SessionState {
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

pub struct SessionManager {
    api: Arc<ApiClient>,
    storage: Arc<dyn TokenStorage>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// Build a session, rehydrating tokens left in `storage` by a previous run.
    /// A persisted access token is installed as the default bearer right away.
    #[must_use]
    pub fn new(api: Arc<ApiClient>, storage: Arc<dyn TokenStorage>) -> Self {
        let access_token = read_key(storage.as_ref(), TOKEN_KEY);
        let refresh_token = read_key(storage.as_ref(), REFRESH_TOKEN_KEY);
        if let Some(token) = &access_token {
            api.set_bearer(token);
        }

        Self { api, storage, state: RwLock::new(SessionState { user: None, access_token, refresh_token }) }
    }

    // =========================================================================
    // STATE
    // =========================================================================

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().access_token.is_some()
    }

    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// `POST auth/login/`. On failure nothing changes, in memory or on disk.
    ///
    /// # Errors
    ///
    /// Returns the server's `error` message, or `"Login failed"`.
    pub async fn login<C: Serialize + ?Sized>(&self, credentials: &C) -> Result<(), String> {
        self.authenticate(LOGIN_PATH, credentials, LOGIN_FAILED).await
    }

    /// `POST auth/register/`. Same contract as [`SessionManager::login`].
    ///
    /// # Errors
    ///
    /// Returns the server's `error` message, or `"Registration failed"`.
    pub async fn register<U: Serialize + ?Sized>(&self, user_data: &U) -> Result<(), String> {
        self.authenticate(REGISTER_PATH, user_data, REGISTRATION_FAILED).await
    }

    async fn authenticate<B: Serialize + ?Sized>(&self, path: &str, body: &B, default: &str) -> Result<(), String> {
        let auth = self.post_auth(path, body).await.map_err(|e| {
            debug!(error = %e, path, "authentication failed");
            e.message_or(default)
        })?;

        {
            let mut state = self.write();
            state.user = Some(auth.user);
            state.access_token = Some(auth.tokens.access.clone());
            state.refresh_token = Some(auth.tokens.refresh.clone());
        }
        self.persist(TOKEN_KEY, &auth.tokens.access);
        self.persist(REFRESH_TOKEN_KEY, &auth.tokens.refresh);
        self.api.set_bearer(&auth.tokens.access);

        info!(path, "session established");
        Ok(())
    }

    async fn post_auth<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<AuthResponse, ApiError> {
        let body = api::encode(body)?;
        let response = self.api.post(path, body).await?;
        api::decode(response)
    }

    /// Best-effort server logout, then an unconditional local wipe. With no
    /// refresh token held no request is sent.
    pub async fn logout(&self) {
        if let Some(refresh) = self.refresh_token() {
            if let Err(e) = self
                .api
                .post(LOGOUT_PATH, json!({ "refresh_token": refresh }))
                .await
            {
                warn!(error = %e, "logout request failed; clearing local session anyway");
            }
        }

        *self.write() = SessionState::default();
        self.forget(TOKEN_KEY);
        self.forget(REFRESH_TOKEN_KEY);
        self.api.clear_bearer();
        info!("session cleared");
    }

    /// Exchange the refresh token for a new access token. Any failure,
    /// including having no refresh token, logs the session out.
    pub async fn refresh_auth(&self) -> bool {
        let Some(refresh) = self.refresh_token() else {
            warn!("no refresh token held; logging out");
            self.logout().await;
            return false;
        };

        let refreshed = self
            .api
            .post(REFRESH_PATH, json!({ "refresh": refresh }))
            .await
            .and_then(api::decode::<RefreshResponse>);

        match refreshed {
            Ok(RefreshResponse { access }) => {
                self.write().access_token = Some(access.clone());
                self.persist(TOKEN_KEY, &access);
                self.api.set_bearer(&access);
                info!("access token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; logging out");
                self.logout().await;
                false
            }
        }
    }

    /// `GET auth/profile/`. On a 401 the token is refreshed and the read is
    /// retried at most [`MAX_PROFILE_RETRIES`] times; the refresh always
    /// completes before the retry is sent.
    pub async fn load_user(&self) -> bool {
        for attempt in 0..=MAX_PROFILE_RETRIES {
            let error = match self.api.get(PROFILE_PATH).await.and_then(api::decode::<User>) {
                Ok(user) => {
                    self.write().user = Some(user);
                    return true;
                }
                Err(e) => e,
            };

            debug!(error = %error, attempt, "profile load failed");
            if !error.is_unauthorized() || attempt == MAX_PROFILE_RETRIES {
                return false;
            }
            if !self.refresh_auth().await {
                return false;
            }
        }
        false
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!(error = %e, key, "failed to persist token");
        }
    }

    fn forget(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(error = %e, key, "failed to remove persisted token");
        }
    }
}

fn read_key(storage: &dyn TokenStorage, key: &str) -> Option<String> {
    storage.get(key).unwrap_or_else(|e| {
        warn!(error = %e, key, "failed to read persisted token");
        None
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
