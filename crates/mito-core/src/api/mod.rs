//! Typed operations for every backend endpoint the client consumes.
//!
//! All calls go through [`RequestExecutor`]; nothing here retries on its own.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::http::{ApiRequest, FilePart, RequestExecutor};
use crate::models::{Attachment, Comment, Department, RecordId, Task, User};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// `{user, token}` returned by `/auth/login`.
#[derive(Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoginResponse")
            .field("user", &self.user)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Fields accepted by `/auth/register`.
#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("department_id", &self.department_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RegisterResponse {
    user: User,
}

/// Backend client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: AppConfig,
    executor: RequestExecutor,
}

impl ApiClient {
    pub const fn new(config: AppConfig, executor: RequestExecutor) -> Self {
        Self { config, executor }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    // --- Auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = ApiRequest::post(self.url("/auth/login")).with_json(&serde_json::json!({
            "email": email,
            "password": password,
        }))?;
        self.call_unqueued(request).await
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        let request = ApiRequest::post(self.url("/auth/register")).with_json(registration)?;
        let response: RegisterResponse = self.call_unqueued(request).await?;
        Ok(response.user)
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        let request = ApiRequest::post(self.url("/auth/logout")).with_bearer(Some(token));
        self.call_unqueued::<Value>(request).await.map(|_| ())
    }

    /// Current user. Accepts either a bare user or a `{user}` envelope.
    pub async fn get_profile(&self, token: &str) -> Result<User> {
        let request = ApiRequest::get(self.url("/auth/me")).with_bearer(Some(token));
        let payload: Value = self.call(request).await?;
        decode_user(payload)
    }

    pub async fn update_profile(&self, token: &str, user_id: &RecordId, changes: &Value) -> Result<User> {
        let path = format!("/users/{}", segment(user_id));
        let request = ApiRequest::put(self.url(&path))
            .with_bearer(Some(token))
            .with_json(changes)?;
        let payload: Value = self.call(request).await?;
        decode_user(payload)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        let request = ApiRequest::post(self.url("/auth/forgot-password"))
            .with_json(&serde_json::json!({ "email": email }))?;
        self.call_unqueued(request).await
    }

    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<Value> {
        let request = ApiRequest::post(self.url("/auth/reset-password")).with_json(&serde_json::json!({
            "token": reset_token,
            "password": password,
        }))?;
        self.call_unqueued(request).await
    }

    pub async fn verify_reset_token(&self, reset_token: &str) -> Result<Value> {
        let path = format!(
            "/auth/verify-reset-token/{}",
            urlencoding::encode(reset_token.trim())
        );
        self.call(ApiRequest::get(self.url(&path))).await
    }

    pub async fn change_password(&self, token: &str, current_password: &str, new_password: &str) -> Result<Value> {
        let request = ApiRequest::post(self.url("/auth/change-password"))
            .with_bearer(Some(token))
            .with_json(&serde_json::json!({
                "currentPassword": current_password,
                "newPassword": new_password,
            }))?;
        self.call_unqueued(request).await
    }

    // --- Departments ---

    pub async fn get_departments(&self) -> Result<Vec<Department>> {
        let payload: Value = self.call(ApiRequest::get(self.url("/departments"))).await?;
        decode_list(payload, "departments")
    }

    // --- Tasks ---

    pub async fn get_tasks(&self, token: &str, assigned_to: Option<&RecordId>) -> Result<Vec<Task>> {
        let mut url = self.url("/tasks");
        if let Some(assignee) = assigned_to {
            url.push_str("?assignedTo=");
            url.push_str(&urlencoding::encode(assignee.as_str()));
        }
        let payload: Value = self.call(ApiRequest::get(url).with_bearer(Some(token))).await?;
        decode_list(payload, "tasks")
    }

    pub async fn get_task(&self, token: &str, task_id: &RecordId) -> Result<Task> {
        let path = format!("/tasks/{}", segment(task_id));
        self.call(ApiRequest::get(self.url(&path)).with_bearer(Some(token)))
            .await
    }

    pub async fn update_task(&self, token: &str, task_id: &RecordId, updates: &Value) -> Result<Task> {
        let path = format!("/tasks/{}", segment(task_id));
        let request = ApiRequest::put(self.url(&path))
            .with_bearer(Some(token))
            .with_json(updates)?;
        self.call(request).await
    }

    // --- Comments ---

    pub async fn get_task_comments(&self, token: &str, task_id: &RecordId) -> Result<Vec<Comment>> {
        let path = format!("/comments/task/{}", segment(task_id));
        let payload: Value = self
            .call(ApiRequest::get(self.url(&path)).with_bearer(Some(token)))
            .await?;
        decode_list(payload, "comments")
    }

    pub async fn add_task_comment(&self, token: &str, task_id: &RecordId, content: &str) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("comment must not be empty".to_string()));
        }
        let request = ApiRequest::post(self.url("/comments"))
            .with_bearer(Some(token))
            .with_json(&serde_json::json!({
                "content": content,
                "taskId": task_id,
            }))?;
        self.call(request).await
    }

    pub async fn delete_task_comment(&self, token: &str, comment_id: &RecordId) -> Result<Value> {
        let path = format!("/comments/{}", segment(comment_id));
        self.call(ApiRequest::delete(self.url(&path)).with_bearer(Some(token)))
            .await
    }

    // --- Notifications ---

    /// Raw notification documents; normalization happens in the aggregator.
    pub async fn get_notifications(&self, token: &str) -> Result<Vec<Value>> {
        let payload: Value = self
            .call(ApiRequest::get(self.url("/notifications")).with_bearer(Some(token)))
            .await?;
        decode_list(payload, "notifications")
    }

    /// Unread count derived from the full list.
    pub async fn unread_notification_count(&self, token: &str) -> Result<usize> {
        let notifications = self.get_notifications(token).await?;
        Ok(notifications
            .iter()
            .filter(|notification| !is_read(notification))
            .count())
    }

    pub async fn mark_notification_read(&self, token: &str, notification_id: &RecordId) -> Result<Value> {
        let path = format!("/notifications/{}/read", segment(notification_id));
        self.call(ApiRequest::put(self.url(&path)).with_bearer(Some(token)))
            .await
    }

    pub async fn mark_all_notifications_read(&self, token: &str) -> Result<Value> {
        self.call(ApiRequest::put(self.url("/notifications/read-all")).with_bearer(Some(token)))
            .await
    }

    pub async fn delete_notification(&self, token: &str, notification_id: &RecordId) -> Result<Value> {
        let path = format!("/notifications/{}", segment(notification_id));
        self.call(ApiRequest::delete(self.url(&path)).with_bearer(Some(token)))
            .await
    }

    // --- Files ---

    /// Upload a file as the `file` multipart field.
    pub async fn upload_task_attachment(
        &self,
        token: &str,
        task_id: &RecordId,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Attachment> {
        let file_name = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = mime_guess::from_path(&file_name)
            .first()
            .map_or_else(|| DEFAULT_MIME_TYPE.to_string(), |mime| mime.essence_str().to_string());

        let path = format!("/files/task/{}", segment(task_id));
        let request = ApiRequest::post(self.url(&path))
            .with_bearer(Some(token))
            .with_file(FilePart {
                field: "file".to_string(),
                file_name,
                content_type,
                data,
            });
        self.call(request).await
    }

    pub async fn delete_task_attachment(&self, token: &str, file_id: &RecordId) -> Result<Value> {
        let path = format!("/files/{}", segment(file_id));
        self.call(ApiRequest::delete(self.url(&path)).with_bearer(Some(token)))
            .await
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.executor.execute(&request).await?.error_for_status()?;
        response.json()
    }

    /// For auth calls: never lands in the action log.
    async fn call_unqueued<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self
            .executor
            .execute_unqueued(&request)
            .await?
            .error_for_status()?;
        response.json()
    }
}

fn segment(id: &RecordId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

fn decode_user(payload: Value) -> Result<User> {
    let user = match payload {
        Value::Object(mut map) if map.get("user").is_some_and(Value::is_object) => {
            map.remove("user").unwrap_or(Value::Null)
        }
        other => other,
    };
    Ok(serde_json::from_value(user)?)
}

/// Accept a bare array or an object wrapping it under `key`.
fn decode_list<T: DeserializeOwned>(payload: Value, key: &str) -> Result<Vec<T>> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "expected a list of {key} in response"
                )));
            }
        },
        _ => {
            return Err(Error::InvalidInput(format!(
                "expected a list of {key} in response"
            )));
        }
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(Error::from))
        .collect()
}

fn is_read(notification: &Value) -> bool {
    notification
        .get("isRead")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
