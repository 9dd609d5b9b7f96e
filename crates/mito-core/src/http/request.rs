//! Request and response descriptors passed through the executor.
//!
//! These are plain data so a request can be persisted to the action log and
//! replayed later without holding a live client.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// POST, PUT, PATCH and DELETE: the methods eligible for offline queueing.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// A single file sent as a multipart form part.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    /// Form field name, `file` for task attachments.
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    /// Raw bytes, base64 in the durable form.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequestBody {
    /// Serialized JSON text.
    Json { content: String },
    File(FilePart),
}

/// An outgoing HTTP call.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach `Authorization: Bearer <token>` when a token is given.
    #[must_use]
    pub fn with_bearer(self, token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => self.with_header(AUTHORIZATION, format!("Bearer {token}")),
            None => self,
        }
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let content = serde_json::to_string(payload)?;
        self.headers
            .insert(CONTENT_TYPE.to_string(), "application/json".to_string());
        self.body = Some(RequestBody::Json { content });
        Ok(self)
    }

    #[must_use]
    pub fn with_file(mut self, part: FilePart) -> Self {
        self.body = Some(RequestBody::File(part));
        self
    }

    /// Drop the `Authorization` header (case-insensitive).
    #[must_use]
    pub fn without_authorization(mut self) -> Self {
        self.headers
            .retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION));
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION) {
                    (name.as_str(), "[REDACTED]")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        formatter
            .debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// A completed HTTP exchange. Any status code, including errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decode a successful body; an empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Convert a non-2xx response into `Error::Http`.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Http {
                status: self.status,
                message: parse_api_error(self.status, &self.body),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<serde_json::Value>,
    message: Option<serde_json::Value>,
}

/// Server `error`, then `message`, then `HTTP <status>`.
pub fn parse_api_error(status: u16, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        let candidate = [payload.error, payload.message]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                serde_json::Value::String(text) if !text.trim().is_empty() => {
                    Some(text.trim().to_string())
                }
                _ => None,
            });
        if let Some(message) = candidate {
            return message;
        }
    }
    format!("HTTP {status}")
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_api_error_prefers_error_then_message() {
        assert_eq!(
            parse_api_error(400, r#"{"error":"Email taken","message":"ignored"}"#),
            "Email taken"
        );
        assert_eq!(parse_api_error(404, r#"{"message":"Task not found"}"#), "Task not found");
        assert_eq!(parse_api_error(500, "<html>oops</html>"), "HTTP 500");
        assert_eq!(parse_api_error(502, r#"{"error":""}"#), "HTTP 502");
    }

    #[test]
    fn bearer_is_skipped_for_blank_tokens() {
        let request = ApiRequest::get("http://x/api/tasks").with_bearer(Some("  "));
        assert!(request.headers.is_empty());
        let request = ApiRequest::get("http://x/api/tasks").with_bearer(Some("abc"));
        assert_eq!(request.headers.get(AUTHORIZATION).map(String::as_str), Some("Bearer abc"));
        assert!(request.without_authorization().headers.is_empty());
    }

    #[test]
    fn debug_output_redacts_authorization() {
        let request = ApiRequest::get("http://x/api/auth/me").with_bearer(Some("secret-token"));
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn file_body_persists_as_base64() {
        let body = RequestBody::File(FilePart {
            field: "file".to_string(),
            file_name: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"hi".to_vec(),
        });
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["kind"], serde_json::json!("file"));
        assert_eq!(value["data"], serde_json::json!("aGk="));
        let back: RequestBody = serde_json::from_value(value).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let response = ApiResponse::new(204, "");
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value, serde_json::Value::Null);
        assert!(ApiResponse::new(401, "{}").error_for_status().is_err());
    }
}
