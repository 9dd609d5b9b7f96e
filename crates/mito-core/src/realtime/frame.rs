//! Engine.IO v4 / Socket.IO v4 text framing over a WebSocket.
//!
//! Only the subset the client needs: handshake, heartbeat, connect,
//! disconnect and events on the default namespace. Binary packets and acks
//! are not supported.

use serde::Deserialize;
use serde_json::Value;

/// Handshake payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// Socket.IO namespace connect accepted.
    Connect,
    /// Server closed the namespace.
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(String),
    /// Well-formed but unsupported, or garbage.
    Unknown(String),
}

pub const PONG: &str = "3";

#[must_use]
pub fn decode(text: &str) -> Frame {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => serde_json::from_str(chars.as_str())
            .map_or_else(|_| Frame::Unknown(text.to_string()), Frame::Open),
        Some('1') => Frame::Close,
        Some('2') => Frame::Ping,
        Some('3') => Frame::Pong,
        Some('6') => Frame::Noop,
        Some('4') => decode_packet(chars.as_str()),
        _ => Frame::Unknown(text.to_string()),
    }
}

fn decode_packet(packet: &str) -> Frame {
    let mut chars = packet.chars();
    let kind = chars.next();
    let body = skip_namespace(chars.as_str());
    match kind {
        Some('0') => Frame::Connect,
        Some('1') => Frame::Disconnect,
        Some('2') => decode_event(body.trim_start_matches(|ch: char| ch.is_ascii_digit()))
            .unwrap_or_else(|| Frame::Unknown(packet.to_string())),
        Some('4') => Frame::ConnectError(connect_error_message(body)),
        _ => Frame::Unknown(packet.to_string()),
    }
}

/// Strip a `/namespace,` prefix.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    }
}

fn decode_event(body: &str) -> Option<Frame> {
    let Value::Array(mut items) = serde_json::from_str(body).ok()? else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    let Value::String(name) = items.remove(0) else {
        return None;
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };
    Some(Frame::Event { name, payload })
}

fn connect_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_string),
        Ok(Value::String(message)) => message,
        _ => body.to_string(),
    }
}

/// `40{auth}`: join the default namespace with an auth payload.
#[must_use]
pub fn encode_connect(auth: &Value) -> String {
    format!("40{auth}")
}

/// `42["name",payload]`.
#[must_use]
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", Value::Array(vec![Value::String(name.to_string()), payload.clone()]))
}
