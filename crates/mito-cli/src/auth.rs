//! CLI session persistence backed by the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use mito_core::auth::{Session, SessionStore};
use mito_core::{Error, Result, User};
use serde::{Deserialize, Serialize};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "mito-cli";

#[derive(Serialize, Deserialize)]
struct StoredSession {
    user: User,
    token: String,
}

/// Keeps the signed-in user and bearer token in one keychain entry per
/// backend URL, so switching `MITO_API_URL` does not leak sessions across
/// deployments.
#[derive(Debug, Clone)]
pub struct KeyringSessionStore {
    username: String,
}

impl KeyringSessionStore {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            username: format!("session:{api_base_url}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username).map_err(secure_storage_error)
    }
}

fn decode(raw: &str) -> Option<Session> {
    match serde_json::from_str::<StoredSession>(raw) {
        Ok(stored) if !stored.token.trim().is_empty() => Some(Session {
            user: stored.user,
            token: stored.token,
        }),
        Ok(_) => None,
        Err(error) => {
            tracing::warn!("Stored session is unreadable, ignoring it: {}", error);
            None
        }
    }
}

fn encode(session: &Session) -> Result<String> {
    Ok(serde_json::to_string(&StoredSession {
        user: session.user.clone(),
        token: session.token.clone(),
    })?)
}

#[allow(clippy::needless_pass_by_value)]
fn secure_storage_error(error: impl ToString) -> Error {
    Error::Storage(format!("keychain: {}", error.to_string()))
}

impl SessionStore for KeyringSessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> Result<Option<Session>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(decode(&raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(secure_storage_error(error)),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> Result<Option<Session>> {
        let guard = Self::test_store().lock().map_err(secure_storage_error)?;
        Ok(guard.get(&self.username).and_then(|raw| decode(raw)))
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &Session) -> Result<()> {
        let raw = encode(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(secure_storage_error)
    }

    #[cfg(test)]
    fn save_session(&self, session: &Session) -> Result<()> {
        let raw = encode(session)?;
        let mut guard = Self::test_store().lock().map_err(secure_storage_error)?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(secure_storage_error(error)),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> Result<()> {
        let mut guard = Self::test_store().lock().map_err(secure_storage_error)?;
        guard.remove(&self.username);
        Ok(())
    }
}
