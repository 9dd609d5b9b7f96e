//! Push topics and their typed payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{Comment, RecordId, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    TaskUpdate,
    TaskStatusChange,
    TaskAssignmentChange,
    TaskDeleted,
    NewComment,
    CommentUpdate,
    CommentDeleted,
    NotificationRemoved,
    PerformanceUpdate,
    Notification,
}

impl Topic {
    pub const ALL: [Self; 10] = [
        Self::TaskUpdate,
        Self::TaskStatusChange,
        Self::TaskAssignmentChange,
        Self::TaskDeleted,
        Self::NewComment,
        Self::CommentUpdate,
        Self::CommentDeleted,
        Self::NotificationRemoved,
        Self::PerformanceUpdate,
        Self::Notification,
    ];

    /// Listener key, e.g. `taskStatusChange`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskUpdate => "taskUpdate",
            Self::TaskStatusChange => "taskStatusChange",
            Self::TaskAssignmentChange => "taskAssignmentChange",
            Self::TaskDeleted => "taskDeleted",
            Self::NewComment => "newComment",
            Self::CommentUpdate => "commentUpdate",
            Self::CommentDeleted => "commentDeleted",
            Self::NotificationRemoved => "notificationRemoved",
            Self::PerformanceUpdate => "performanceUpdate",
            Self::Notification => "notification",
        }
    }

    /// Event name the server emits, e.g. `task_status_change`.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::TaskUpdate => "task_update",
            Self::TaskStatusChange => "task_status_change",
            Self::TaskAssignmentChange => "task_assignment_change",
            Self::TaskDeleted => "task_deleted",
            Self::NewComment => "new_comment",
            Self::CommentUpdate => "comment_update",
            Self::CommentDeleted => "comment_deleted",
            Self::NotificationRemoved => "notification_removed",
            Self::PerformanceUpdate => "performance_update",
            Self::Notification => "notification",
        }
    }

    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.wire_name() == name)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    /// Accepts either the listener key or the wire name.
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == value || topic.wire_name() == value)
            .ok_or_else(|| Error::InvalidInput(format!("unknown realtime topic '{value}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusChanged {
    pub task_id: RecordId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignmentChanged {
    pub task_id: RecordId,
    #[serde(default)]
    pub assigned_to_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    pub task_id: RecordId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeleted {
    pub comment_id: RecordId,
    #[serde(default)]
    pub task_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRemoved {
    pub notification_id: RecordId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decoded push event, one variant per topic.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    TaskUpdate(Task),
    TaskStatusChange(TaskStatusChanged),
    TaskAssignmentChange(TaskAssignmentChanged),
    TaskDeleted(TaskDeleted),
    NewComment(Comment),
    CommentUpdate(Comment),
    CommentDeleted(CommentDeleted),
    NotificationRemoved(NotificationRemoved),
    PerformanceUpdate(Value),
    Notification(Value),
}

impl RealtimeEvent {
    /// Decode a raw payload for `topic`.
    pub fn decode(topic: Topic, payload: Value) -> Result<Self> {
        Ok(match topic {
            Topic::TaskUpdate => Self::TaskUpdate(serde_json::from_value(payload)?),
            Topic::TaskStatusChange => Self::TaskStatusChange(serde_json::from_value(payload)?),
            Topic::TaskAssignmentChange => {
                Self::TaskAssignmentChange(serde_json::from_value(payload)?)
            }
            Topic::TaskDeleted => Self::TaskDeleted(serde_json::from_value(payload)?),
            Topic::NewComment => Self::NewComment(serde_json::from_value(payload)?),
            Topic::CommentUpdate => Self::CommentUpdate(serde_json::from_value(payload)?),
            Topic::CommentDeleted => Self::CommentDeleted(serde_json::from_value(payload)?),
            Topic::NotificationRemoved => {
                Self::NotificationRemoved(serde_json::from_value(payload)?)
            }
            Topic::PerformanceUpdate => Self::PerformanceUpdate(payload),
            Topic::Notification => Self::Notification(payload),
        })
    }

    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::TaskUpdate(_) => Topic::TaskUpdate,
            Self::TaskStatusChange(_) => Topic::TaskStatusChange,
            Self::TaskAssignmentChange(_) => Topic::TaskAssignmentChange,
            Self::TaskDeleted(_) => Topic::TaskDeleted,
            Self::NewComment(_) => Topic::NewComment,
            Self::CommentUpdate(_) => Topic::CommentUpdate,
            Self::CommentDeleted(_) => Topic::CommentDeleted,
            Self::NotificationRemoved(_) => Topic::NotificationRemoved,
            Self::PerformanceUpdate(_) => Topic::PerformanceUpdate,
            Self::Notification(_) => Topic::Notification,
        }
    }
}
