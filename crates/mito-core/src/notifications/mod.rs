//! Notification aggregation: normalization of raw pushes, the toast surface
//! with its shown-id gate, and age-based cleanup.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::config::NotificationConfig;
use crate::error::Result;
use crate::models::{NormalizedNotification, NotificationType, RecordId};
use crate::util::{parse_iso, to_iso};

const FALLBACK_TITLE: &str = "New notification";
const FALLBACK_MESSAGE: &str = "You have a new notification";
const TOAST_CAPACITY: usize = 32;

/// A transient banner for a freshly arrived notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: RecordId,
    pub message: String,
}

/// Field lookup over a raw notification: top level first, then `data`.
struct RawNotification<'a>(&'a Value);

impl<'a> RawNotification<'a> {
    fn field(&self, name: &str) -> Option<&'a Value> {
        let present = |value: &&Value| match value {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        };
        self.0
            .get(name)
            .filter(present)
            .or_else(|| self.0.get("data").and_then(|data| data.get(name)).filter(present))
    }

    fn text(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    fn id(&self, name: &str) -> Option<RecordId> {
        self.field(name).and_then(RecordId::from_json)
    }

    fn has_top_level_content(&self) -> bool {
        ["title", "message"].iter().any(|name| {
            self.0
                .get(*name)
                .and_then(Value::as_str)
                .is_some_and(|text| !text.trim().is_empty())
        })
    }
}

/// Title/message fallback: both kept, one copied into the other, or the
/// fixed placeholders when neither is present.
fn resolve_text(title: Option<String>, message: Option<String>) -> (String, String) {
    match (title, message) {
        (Some(title), Some(message)) => (title, message),
        (Some(title), None) => (title.clone(), title),
        (None, Some(message)) => (message.clone(), message),
        (None, None) => (FALLBACK_TITLE.to_string(), FALLBACK_MESSAGE.to_string()),
    }
}

fn normalize_with(
    raw: &Value,
    now: DateTime<Utc>,
    fallback_id: impl FnOnce() -> RecordId,
) -> NormalizedNotification {
    let raw = RawNotification(raw);
    let (title, message) = resolve_text(raw.text("title"), raw.text("message"));
    let date = raw
        .text("date")
        .and_then(|date| parse_iso(&date))
        .unwrap_or(now);

    NormalizedNotification {
        id: raw.id("id").unwrap_or_else(fallback_id),
        title,
        message,
        kind: raw
            .text("type")
            .map_or(NotificationType::System, |kind| NotificationType::parse(&kind)),
        is_read: false,
        date: to_iso(date),
        task_id: raw.id("taskId"),
        ticket_id: raw.id("ticketId"),
    }
}

/// Normalize a realtime push received at `now`.
///
/// Realtime arrivals are always unread. A missing id becomes the arrival
/// time in milliseconds.
#[must_use]
pub fn normalize(raw: &Value, now: DateTime<Utc>) -> NormalizedNotification {
    normalize_with(raw, now, || RecordId::from(now.timestamp_millis()))
}

/// Normalize a document from `GET /notifications`.
///
/// Entries without a top-level title or message are skipped. `isRead` is
/// kept and `createdAt` stands in for a missing `date`.
#[must_use]
pub fn normalize_remote(raw: &Value, now: DateTime<Utc>) -> Option<NormalizedNotification> {
    let adapter = RawNotification(raw);
    if !adapter.has_top_level_content() {
        return None;
    }
    let mut notification = normalize_with(raw, now, || RecordId::from(now.timestamp_millis()));
    notification.is_read = raw.get("isRead").and_then(Value::as_bool).unwrap_or(false);
    if adapter.field("date").is_none() {
        if let Some(created) = adapter.text("createdAt").and_then(|date| parse_iso(&date)) {
            notification.date = to_iso(created);
        }
    }
    Some(notification)
}

#[derive(Debug, Default)]
struct Inner {
    /// Newest first.
    window: Vec<NormalizedNotification>,
    shown: HashSet<RecordId>,
}

impl Inner {
    fn contains(&self, id: &RecordId) -> bool {
        self.window.iter().any(|notification| &notification.id == id)
    }

    /// Millisecond id not used by any live entry.
    fn fresh_id(&self, now: DateTime<Utc>) -> RecordId {
        let mut millis = now.timestamp_millis();
        loop {
            let candidate = RecordId::from(millis);
            if !self.contains(&candidate) && !self.shown.contains(&candidate) {
                return candidate;
            }
            millis += 1;
        }
    }
}

/// Holds the live notification window. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    config: NotificationConfig,
    inner: Arc<Mutex<Inner>>,
    toasts: broadcast::Sender<Toast>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        let (toasts, _receiver) = broadcast::channel(TOAST_CAPACITY);
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
            toasts,
        }
    }

    /// Receive a toast for each notification that passes the shown-id gate.
    #[must_use]
    pub fn subscribe_toasts(&self) -> broadcast::Receiver<Toast> {
        self.toasts.subscribe()
    }

    /// Accept a realtime push.
    pub fn ingest(&self, raw: &Value) -> NormalizedNotification {
        self.ingest_at(raw, Utc::now())
    }

    /// Accept a realtime push as if it arrived at `now`.
    ///
    /// A notification whose id is already in the window replaces the old
    /// entry. A toast is emitted only for unread ids not yet shown.
    pub fn ingest_at(&self, raw: &Value, now: DateTime<Utc>) -> NormalizedNotification {
        let (notification, toast) = {
            let mut inner = self.lock();
            let notification = normalize_with(raw, now, || inner.fresh_id(now));
            inner.window.retain(|existing| existing.id != notification.id);
            inner.window.insert(0, notification.clone());

            let toast = (!notification.is_read && inner.shown.insert(notification.id.clone()))
                .then(|| Toast {
                    id: notification.id.clone(),
                    message: notification.message.clone(),
                });
            (notification, toast)
        };

        tracing::debug!(id = %notification.id, kind = %notification.kind, "Notification received");
        if let Some(toast) = toast {
            // No subscribers is fine.
            let _ = self.toasts.send(toast);
        }
        notification
    }

    /// Drop entries older than the max age and forget shown ids that are
    /// no longer in the window. Returns how many entries were dropped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::from_std(self.config.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let cutoff = now - max_age;

        let mut inner = self.lock();
        let before = inner.window.len();
        inner.window.retain(|notification| {
            notification
                .created_at()
                .is_some_and(|created| created > cutoff)
        });
        let live: HashSet<RecordId> = inner
            .window
            .iter()
            .map(|notification| notification.id.clone())
            .collect();
        inner.shown.retain(|id| live.contains(id));

        let dropped = before - inner.window.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Swept expired notifications");
        }
        dropped
    }

    /// Run [`Self::sweep`] every sweep interval until the task is aborted.
    #[must_use]
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let center = self.clone();
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                center.sweep(Utc::now());
            }
        })
    }

    /// Snapshot of the window, newest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<NormalizedNotification> {
        self.lock().window.clone()
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.lock()
            .window
            .iter()
            .filter(|notification| !notification.is_read)
            .count()
    }

    /// Replace the window with a fetched list (newest first).
    pub fn load_remote(&self, items: &[Value]) {
        self.load_remote_at(items, Utc::now());
    }

    pub fn load_remote_at(&self, items: &[Value], now: DateTime<Utc>) {
        let mut window: Vec<NormalizedNotification> = items
            .iter()
            .filter_map(|item| normalize_remote(item, now))
            .collect();
        window.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let mut inner = self.lock();
        inner.window = window;
    }

    /// Re-fetch the list from the backend and return the unread count.
    pub async fn refresh_unread_count(&self, api: &ApiClient, token: &str) -> Result<usize> {
        let items = api.get_notifications(token).await?;
        self.load_remote(&items);
        Ok(self.unread_count())
    }

    /// Returns false when the id is not in the window.
    pub fn mark_read(&self, id: &RecordId) -> bool {
        let mut inner = self.lock();
        let Some(notification) = inner.window.iter_mut().find(|notification| &notification.id == id) else {
            return false;
        };
        notification.is_read = true;
        true
    }

    pub fn mark_all_read(&self) {
        for notification in &mut self.lock().window {
            notification.is_read = true;
        }
    }

    /// Returns false when the id is not in the window.
    pub fn remove(&self, id: &RecordId) -> bool {
        let mut inner = self.lock();
        let before = inner.window.len();
        inner.window.retain(|notification| &notification.id != id);
        before != inner.window.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}
