//! Persistent log of mutating requests that could not be sent.
//!
//! All entries live in one storage slot as a JSON array, oldest first. Access
//! is synchronous and assumes this process is the only writer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::http::{ApiRequest, HttpMethod, RequestBody};
use crate::storage::LocalStorage;
use crate::util::now_iso;

/// Storage slot holding the serialized log.
pub const PENDING_ACTIONS_KEY: &str = "pendingActions";

/// A deferred request awaiting replay.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<RequestBody>,
    /// Enqueue time, ISO-8601.
    pub timestamp: String,
    #[serde(default)]
    pub retry_count: u32,
}

impl PendingAction {
    /// Rebuild the request for replay. Carries no credentials.
    #[must_use]
    pub fn to_request(&self) -> ApiRequest {
        ApiRequest {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingAction")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("timestamp", &self.timestamp)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

/// Handle to the durable action log. Clones share the same slot.
#[derive(Clone)]
pub struct ActionLog {
    storage: Arc<dyn LocalStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl ActionLog {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append a mutating request and persist it before returning.
    ///
    /// The `Authorization` header is not stored; replay attaches a fresh one.
    pub fn enqueue(&self, request: &ApiRequest) -> Result<PendingAction> {
        if !request.method.is_mutating() {
            return Err(Error::InvalidInput(format!(
                "{} requests cannot be queued for sync",
                request.method
            )));
        }

        let request = request.clone().without_authorization();
        let action = PendingAction {
            id: Uuid::now_v7().to_string(),
            url: request.url,
            method: request.method,
            headers: request.headers,
            body: request.body,
            timestamp: now_iso(),
            retry_count: 0,
        };

        let _guard = self.lock()?;
        let mut actions = self.list();
        actions.push(action.clone());
        self.write(&actions)?;
        tracing::info!(id = %action.id, method = %action.method, url = %action.url, "Queued action for sync");
        Ok(action)
    }

    /// All pending actions, oldest first.
    ///
    /// An absent or unreadable slot yields an empty list.
    pub fn list(&self) -> Vec<PendingAction> {
        let raw = match self.storage.get_item(PENDING_ACTIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::warn!("Failed to read pending actions: {}", error);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(actions) => actions,
            Err(error) => {
                tracing::warn!("Failed to parse pending actions: {}", error);
                Vec::new()
            }
        }
    }

    /// Delete an entry. Unknown ids are ignored.
    pub fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut actions = self.list();
        let before = actions.len();
        actions.retain(|action| action.id != id);
        if actions.len() != before {
            self.write(&actions)?;
        }
        Ok(())
    }

    /// Bump an entry's retry count, returning the new value.
    ///
    /// Returns `None` when the id is no longer in the log.
    pub fn record_failure(&self, id: &str) -> Result<Option<u32>> {
        let _guard = self.lock()?;
        let mut actions = self.list();
        let Some(action) = actions.iter_mut().find(|action| action.id == id) else {
            return Ok(None);
        };
        action.retry_count = action.retry_count.saturating_add(1);
        let count = action.retry_count;
        self.write(&actions)?;
        Ok(Some(count))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    fn write(&self, actions: &[PendingAction]) -> Result<()> {
        let serialized = serde_json::to_string(actions)?;
        self.storage.set_item(PENDING_ACTIONS_KEY, &serialized)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))
    }
}

impl fmt::Debug for ActionLog {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("ActionLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn log() -> (ActionLog, MemoryStorage) {
        let storage = MemoryStorage::new();
        (ActionLog::new(Arc::new(storage.clone())), storage)
    }

    fn comment_request() -> ApiRequest {
        ApiRequest::post("http://localhost:3000/api/comments")
            .with_bearer(Some("token-1"))
            .with_json(&serde_json::json!({"taskId": "7", "content": "hello"}))
            .unwrap()
    }

    #[test]
    fn enqueue_assigns_identity_and_persists() {
        let (log, storage) = log();
        let action = log.enqueue(&comment_request()).unwrap();

        assert_eq!(action.retry_count, 0);
        assert!(!action.id.is_empty());
        assert!(!action.headers.contains_key("Authorization"));

        let raw = storage.get_item(PENDING_ACTIONS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["retryCount"], serde_json::json!(0));
        assert_eq!(value[0]["method"], serde_json::json!("POST"));
        assert_eq!(log.list(), vec![action]);
    }

    #[test]
    fn enqueue_rejects_get() {
        let (log, _) = log();
        let error = log
            .enqueue(&ApiRequest::get("http://localhost:3000/api/tasks"))
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(log.is_empty());
    }

    #[test]
    fn list_keeps_enqueue_order() {
        let (log, _) = log();
        let first = log.enqueue(&comment_request()).unwrap();
        let second = log
            .enqueue(&ApiRequest::delete("http://localhost:3000/api/comments/3"))
            .unwrap();
        let ids: Vec<String> = log.list().into_iter().map(|action| action.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn removed_ids_never_come_back() {
        let (log, _) = log();
        let action = log.enqueue(&comment_request()).unwrap();
        log.remove(&action.id).unwrap();
        assert!(log.list().iter().all(|entry| entry.id != action.id));
        log.remove(&action.id).unwrap();
        log.remove("missing").unwrap();
    }

    #[test]
    fn corrupt_slot_reads_as_empty() {
        let (log, storage) = log();
        storage.set_item(PENDING_ACTIONS_KEY, "{not json").unwrap();
        assert!(log.list().is_empty());

        log.enqueue(&comment_request()).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn record_failure_increments_monotonically() {
        let (log, _) = log();
        let action = log.enqueue(&comment_request()).unwrap();
        assert_eq!(log.record_failure(&action.id).unwrap(), Some(1));
        assert_eq!(log.record_failure(&action.id).unwrap(), Some(2));
        assert_eq!(log.list()[0].retry_count, 2);
        assert_eq!(log.record_failure("missing").unwrap(), None);
    }

    #[test]
    fn survives_reopening_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let action = {
            let storage = FileStorage::open(dir.path()).unwrap();
            ActionLog::new(Arc::new(storage))
                .enqueue(&comment_request())
                .unwrap()
        };
        let storage = FileStorage::open(dir.path()).unwrap();
        let reopened = ActionLog::new(Arc::new(storage));
        assert_eq!(reopened.list(), vec![action]);
    }
}
