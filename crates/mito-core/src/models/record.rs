//! Backend domain records.
//!
//! The client reads ids and a handful of display fields; everything else the
//! backend sends is preserved in `extra` so it survives a read-modify-write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RecordId;

/// An account as returned by `/auth/login` and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Best display label: name, then email, then id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Overlay fields from a freshly fetched profile.
    ///
    /// Fields present in `fresh` win; fields only present locally are kept.
    pub fn merge_from(&mut self, fresh: Self) -> crate::Result<()> {
        let mut current = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(update) = serde_json::to_value(fresh)? {
            for (key, value) in update {
                current.insert(key, value);
            }
        }
        *self = serde_json::from_value(Value::Object(current))?;
        Ok(())
    }
}

/// A ticket assigned to one or more users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, rename = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A comment on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, rename = "taskId", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<RecordId>,
    #[serde(default, rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A file attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: RecordId,
    #[serde(default, alias = "originalName", skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, alias = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn user_keeps_unknown_fields() {
        let user: User = serde_json::from_value(json!({
            "id": 5,
            "name": "Ada",
            "email": "ada@example.com",
            "phone": "555-0100"
        }))
        .unwrap();
        assert_eq!(user.id.as_str(), "5");
        assert_eq!(user.extra.get("phone"), Some(&json!("555-0100")));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["phone"], json!("555-0100"));
        assert_eq!(back["id"], json!("5"));
    }

    #[test]
    fn merge_overlays_fresh_profile() {
        let mut user: User = serde_json::from_value(json!({
            "id": "u1",
            "name": "Old",
            "email": "a@example.com",
            "avatar": "local.png"
        }))
        .unwrap();
        let fresh: User = serde_json::from_value(json!({
            "id": "u1",
            "name": "New",
            "role": "admin"
        }))
        .unwrap();

        user.merge_from(fresh).unwrap();
        assert_eq!(user.name.as_deref(), Some("New"));
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert_eq!(user.role.as_deref(), Some("admin"));
        assert_eq!(user.extra.get("avatar"), Some(&json!("local.png")));
    }

    #[test]
    fn display_name_falls_back_to_email_then_id() {
        let user: User = serde_json::from_value(json!({"id": "u9"})).unwrap();
        assert_eq!(user.display_name(), "u9");
        let user: User =
            serde_json::from_value(json!({"id": "u9", "email": "x@example.com"})).unwrap();
        assert_eq!(user.display_name(), "x@example.com");
    }
}
