//! Sign-in state: login/logout, stored-credential validation and profile
//! refresh.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::api::{ApiClient, Registration};
use crate::error::{Error, Result};
use crate::models::User;
use crate::storage::LocalStorage;

const USER_KEY: &str = "user";
const TOKEN_KEY: &str = "token";

/// An authenticated user with their bearer token.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("user", &self.user)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

pub trait SessionStore: Clone + Send + Sync + 'static {
    fn load_session(&self) -> Result<Option<Session>>;
    fn save_session(&self, session: &Session) -> Result<()>;
    fn clear_session(&self) -> Result<()>;
}

/// Keeps the session in the `user` and `token` storage slots.
#[derive(Clone)]
pub struct StorageSessionStore {
    storage: Arc<dyn LocalStorage>,
}

impl StorageSessionStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }
}

impl SessionStore for StorageSessionStore {
    fn load_session(&self) -> Result<Option<Session>> {
        let (Some(raw_user), Some(token)) = (
            self.storage.get_item(USER_KEY)?,
            self.storage.get_item(TOKEN_KEY)?,
        ) else {
            return Ok(None);
        };
        let token = token.trim().to_string();
        if token.is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => Ok(Some(Session { user, token })),
            Err(error) => {
                tracing::warn!("Stored user is unreadable, ignoring session: {}", error);
                Ok(None)
            }
        }
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.storage
            .set_item(USER_KEY, &serde_json::to_string(&session.user)?)?;
        self.storage.set_item(TOKEN_KEY, &session.token)
    }

    fn clear_session(&self) -> Result<()> {
        self.storage.remove_item(USER_KEY)?;
        self.storage.remove_item(TOKEN_KEY)
    }
}

impl fmt::Debug for StorageSessionStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("StorageSessionStore").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AuthService<S: SessionStore> {
    api: ApiClient,
    store: S,
}

impl<S: SessionStore> AuthService<S> {
    pub const fn new(api: ApiClient, store: S) -> Self {
        Self { api, store }
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The stored session, without asking the backend.
    pub fn current(&self) -> Result<Option<Session>> {
        self.store.load_session()
    }

    /// Stored session or `NotAuthenticated`.
    pub fn require_session(&self) -> Result<Session> {
        self.current()?.ok_or(Error::NotAuthenticated)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        validate_credentials(email, password)?;
        let response = self.api.login(email.trim(), password).await?;
        if response.token.trim().is_empty() {
            return Err(Error::Auth(
                "Login response did not include a token".to_string(),
            ));
        }
        let session = Session {
            user: response.user,
            token: response.token.trim().to_string(),
        };
        self.store.save_session(&session)?;
        tracing::info!(user = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Load stored credentials and confirm them with the backend.
    ///
    /// Any validation failure clears the stored session.
    pub async fn restore(&self) -> Result<Option<Session>> {
        let Some(session) = self.store.load_session()? else {
            return Ok(None);
        };
        match self.api.get_profile(&session.token).await {
            Ok(_) => Ok(Some(session)),
            Err(error) => {
                tracing::warn!("Stored session failed validation: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Tell the backend (best effort) and forget the local session.
    pub async fn logout(&self) -> Result<()> {
        if let Some(session) = self.store.load_session()? {
            if let Err(error) = self.api.logout(&session.token).await {
                tracing::warn!("Logout request failed: {}", error);
            }
        }
        self.store.clear_session()?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Create an account. The caller still has to log in.
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        validate_credentials(&registration.email, &registration.password)?;
        if registration.name.trim().is_empty() {
            return Err(Error::InvalidInput("Name is required".to_string()));
        }
        self.api.register(registration).await
    }

    /// Fetch the profile and merge it into the stored user.
    pub async fn refresh_profile(&self) -> Result<Session> {
        let mut session = self.require_session()?;
        let fresh = self.api.get_profile(&session.token).await?;
        session.user.merge_from(fresh)?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Update profile fields, then merge the result into the stored user.
    pub async fn update_profile(&self, changes: &Value) -> Result<Session> {
        let mut session = self.require_session()?;
        let updated = self
            .api
            .update_profile(&session.token, &session.user.id, changes)
            .await?;
        session.user.merge_from(updated)?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        if email.trim().is_empty() {
            return Err(Error::InvalidInput("Email is required".to_string()));
        }
        self.api.forgot_password(email.trim()).await
    }

    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<Value> {
        self.api.reset_password(reset_token, password).await
    }

    pub async fn verify_reset_token(&self, reset_token: &str) -> Result<Value> {
        self.api.verify_reset_token(reset_token).await
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<Value> {
        let session = self.require_session()?;
        self.api
            .change_password(&session.token, current_password, new_password)
            .await
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(Error::InvalidInput("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(Error::InvalidInput("Password is required".to_string()));
    }
    Ok(())
}
