//! Notification records shown in the in-app list and toast surface.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::util::parse_iso;

/// Category of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    TaskAssigned,
    TaskUpdated,
    CommentAdded,
    FileUploaded,
    #[default]
    System,
    /// A category this client does not know about yet.
    Other(String),
}

impl NotificationType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskUpdated => "task_updated",
            Self::CommentAdded => "comment_added",
            Self::FileUploaded => "file_uploaded",
            Self::System => "system",
            Self::Other(other) => other,
        }
    }

    /// Parse a wire value, treating blank input as `system`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "system" => Self::System,
            "task_assigned" => Self::TaskAssigned,
            "task_updated" => Self::TaskUpdated,
            "comment_added" => Self::CommentAdded,
            "file_uploaded" => Self::FileUploaded,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<NotificationType> for String {
    fn from(value: NotificationType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification after the fallback rules have been applied.
///
/// `title` and `message` are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNotification {
    pub id: RecordId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    /// ISO-8601 creation time.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<RecordId>,
}

impl NormalizedNotification {
    /// Parsed `date`, if it is a valid timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_iso(&self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_type_roundtrips_unknown_values() {
        let kind: NotificationType = serde_json::from_str("\"deadline_near\"").unwrap();
        assert_eq!(kind, NotificationType::Other("deadline_near".to_string()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"deadline_near\"");
        assert_eq!(NotificationType::parse("  "), NotificationType::System);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let notification = NormalizedNotification {
            id: RecordId::from("n1"),
            title: "Hello".to_string(),
            message: "World".to_string(),
            kind: NotificationType::TaskAssigned,
            is_read: false,
            date: "2024-05-01T10:00:00.000Z".to_string(),
            task_id: Some(RecordId::from(12)),
            ticket_id: None,
        };
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["isRead"], serde_json::json!(false));
        assert_eq!(value["type"], serde_json::json!("task_assigned"));
        assert_eq!(value["taskId"], serde_json::json!("12"));
        assert!(value.get("ticketId").is_none());
    }
}
