use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mito_core::api::ApiClient;
use mito_core::auth::{AuthService, Session};
use mito_core::config::AppConfig;
use mito_core::connectivity::Connectivity;
use mito_core::http::{GatedTransport, ReqwestTransport, RequestExecutor, RetryPolicy, Transport};
use mito_core::models::{Comment, Task};
use mito_core::outbox::{ActionLog, PendingAction};
use mito_core::storage::{FileStorage, LocalStorage};
use mito_core::sync::SyncCoordinator;
use mito_core::{NormalizedNotification, RecordId};
use serde_json::{Map, Value};

use crate::auth::KeyringSessionStore;
use crate::error::CliError;

/// Global options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub offline: bool,
}

/// Everything a command needs, wired once per invocation.
pub struct AppContext {
    pub config: AppConfig,
    pub connectivity: Connectivity,
    pub action_log: ActionLog,
    pub executor: RequestExecutor,
    pub api: ApiClient,
    pub auth: AuthService<KeyringSessionStore>,
}

impl AppContext {
    pub fn open(options: &GlobalOptions) -> Result<Self, CliError> {
        let mut config = AppConfig::from_env()?;
        if let Some(url) = options.api_url.as_deref() {
            config = config.with_api_base_url(url)?;
        }
        let data_dir = resolve_data_dir(options.data_dir.clone());
        let connectivity = Connectivity::new(!options.offline);
        let transport = GatedTransport::new(ReqwestTransport::new()?, connectivity.clone());
        Self::with_transport(config, &data_dir, Arc::new(transport), connectivity)
    }

    pub fn with_transport(
        config: AppConfig,
        data_dir: &Path,
        transport: Arc<dyn Transport>,
        connectivity: Connectivity,
    ) -> Result<Self, CliError> {
        let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::open(data_dir)?);
        let action_log = ActionLog::new(storage);
        let executor = RequestExecutor::new(
            transport,
            RetryPolicy::from_config(&config),
            connectivity.clone(),
            action_log.clone(),
        );
        let api = ApiClient::new(config.clone(), executor.clone());
        let auth = AuthService::new(api.clone(), KeyringSessionStore::new(&config.api_base_url));
        Ok(Self {
            config,
            connectivity,
            action_log,
            executor,
            api,
            auth,
        })
    }

    pub fn session(&self) -> Result<Session, CliError> {
        Ok(self.auth.require_session()?)
    }

    pub fn sync_coordinator(&self) -> SyncCoordinator {
        SyncCoordinator::new(self.executor.clone())
    }
}

pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mito")
    })
}

/// Turn a deferred mutation into a success.
///
/// Returns `None` (after telling the user) when the request was saved to the
/// action log instead of reaching the backend.
pub fn settle<T>(result: mito_core::Result<T>) -> Result<Option<T>, CliError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(mito_core::Error::QueuedForSync { action_id }) => {
            println!("Saved offline ({action_id}). Run `mito sync` once you are back online.");
            Ok(None)
        }
        Err(error) => Err(error.into()),
    }
}

pub fn parse_record_id(raw: &str) -> Result<RecordId, CliError> {
    Ok(raw.parse::<RecordId>()?)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build a JSON object from named flags plus `KEY=VALUE` assignments.
///
/// Values that parse as JSON (numbers, booleans, objects) keep their type;
/// anything else is sent as a string.
pub fn build_changes(named: &[(&str, Option<&str>)], assignments: &[String]) -> Result<Value, CliError> {
    let mut changes = Map::new();
    for (key, value) in named {
        if let Some(value) = value {
            changes.insert((*key).to_string(), Value::String((*value).to_string()));
        }
    }
    for assignment in assignments {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(CliError::InvalidAssignment(assignment.clone()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidAssignment(assignment.clone()));
        }
        let value = serde_json::from_str(value.trim())
            .unwrap_or_else(|_| Value::String(value.to_string()));
        changes.insert(key.to_string(), value);
    }
    if changes.is_empty() {
        return Err(CliError::EmptyUpdate);
    }
    Ok(Value::Object(changes))
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

fn relative_iso(value: Option<&str>, now: DateTime<Utc>) -> String {
    value
        .and_then(mito_core::util::parse_iso)
        .map_or_else(
            || "-".to_string(),
            |at| format_relative_time(at.timestamp_millis(), now.timestamp_millis()),
        )
}

pub fn format_task_line(task: &Task) -> String {
    let status = task.status.as_deref().unwrap_or("-");
    let title = task.title.as_deref().map_or_else(|| "(untitled)".to_string(), |title| preview(title, 60));
    match task.due_date.as_deref() {
        Some(due) => format!("{}  [{status}]  {title}  (due {due})", task.id),
        None => format!("{}  [{status}]  {title}", task.id),
    }
}

pub fn format_comment_line(comment: &Comment, now: DateTime<Utc>) -> String {
    let author = comment
        .user
        .as_ref()
        .and_then(|user| user.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let content = preview(comment.content.as_deref().unwrap_or(""), 72);
    format!(
        "{}  {}  {author}: {content}",
        comment.id,
        relative_iso(comment.created_at.as_deref(), now)
    )
}

pub fn format_notification_line(notification: &NormalizedNotification, now: DateTime<Utc>) -> String {
    let marker = if notification.is_read { ' ' } else { '*' };
    format!(
        "{marker} {}  {}  {}: {}",
        notification.id,
        relative_iso(Some(&notification.date), now),
        notification.title,
        preview(&notification.message, 72)
    )
}

pub fn format_action_line(action: &PendingAction, now: DateTime<Utc>) -> String {
    let retries = match action.retry_count {
        0 => String::new(),
        1 => "  (1 failed attempt)".to_string(),
        count => format!("  ({count} failed attempts)"),
    };
    format!(
        "{}  {} {}  {}{retries}",
        action.id,
        action.method,
        action.url,
        relative_iso(Some(&action.timestamp), now)
    )
}
