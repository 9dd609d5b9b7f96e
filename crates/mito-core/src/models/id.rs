//! Backend record identifiers.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a backend record (user, task, comment, notification, ...).
///
/// The backend emits ids as either JSON strings or numbers; both are kept in
/// their textual form so they can be compared and placed into URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id from a loosely-typed JSON value.
    ///
    /// Accepts non-empty strings and numbers; anything else yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(text) if !text.trim().is_empty() => {
                Some(Self(text.trim().to_string()))
            }
            serde_json::Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput("id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordIdVisitor;

        impl Visitor<'_> for RecordIdVisitor {
            type Value = RecordId;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<RecordId, E> {
                Ok(RecordId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<RecordId, E> {
                Ok(RecordId(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<RecordId, E> {
                Ok(RecordId(value.to_string()))
            }
        }

        deserializer.deserialize_any(RecordIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numbers_and_strings() {
        let numeric: RecordId = serde_json::from_str("42").unwrap();
        let textual: RecordId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(numeric.as_str(), "42");
        assert_eq!(textual.as_str(), "abc");
        assert_eq!(serde_json::to_string(&numeric).unwrap(), "\"42\"");
    }

    #[test]
    fn from_json_rejects_blank_and_structured_values() {
        assert!(RecordId::from_json(&serde_json::json!("  ")).is_none());
        assert!(RecordId::from_json(&serde_json::json!({"id": 1})).is_none());
        assert_eq!(
            RecordId::from_json(&serde_json::json!(7)),
            Some(RecordId::from(7))
        );
    }
}
