//! The shared realtime connection and its per-topic handler registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::frame::{self, Frame};
use super::topic::{RealtimeEvent, Topic};
use crate::config::RealtimeConfig;
use crate::error::{Error, Result};
use crate::models::RecordId;

pub type Handler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;
pub type NotificationHandler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Observer returned by [`RealtimeChannel::connect`].
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    state: watch::Receiver<ConnectionState>,
}

impl ChannelHandle {
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the channel reaches `target`. False if the channel is gone.
    pub async fn wait_for(&mut self, target: ConnectionState) -> bool {
        self.state.wait_for(|state| *state == target).await.is_ok()
    }

    /// Wait for the next state change and return the new state.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }
}

struct Driver {
    task: JoinHandle<()>,
    outbound: mpsc::UnboundedSender<String>,
}

/// One push connection per signed-in session.
pub struct RealtimeChannel {
    url: String,
    config: RealtimeConfig,
    handlers: Arc<Mutex<HashMap<Topic, Handler>>>,
    state: Arc<watch::Sender<ConnectionState>>,
    generation: Arc<AtomicU64>,
    driver: Mutex<Option<Driver>>,
}

impl RealtimeChannel {
    /// `url` is the websocket endpoint, see [`crate::config::AppConfig::realtime_url`].
    pub fn new(url: impl Into<String>, config: RealtimeConfig) -> Self {
        let (state, _receiver) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            config,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            driver: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            state: self.state.subscribe(),
        }
    }

    /// Open the connection, replacing any previous one.
    ///
    /// Once connected the channel emits `join` with `user_id`. Pushes on the
    /// `notification` topic always go to `on_notification`.
    pub fn connect(
        &self,
        token: &str,
        user_id: &RecordId,
        on_notification: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ChannelHandle {
        self.disconnect();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let session = Session {
            url: self.url.clone(),
            token: token.to_string(),
            user_id: user_id.clone(),
            config: self.config.clone(),
            handlers: Arc::clone(&self.handlers),
            on_notification: Arc::new(on_notification),
            state: Arc::clone(&self.state),
            generation,
            current_generation: Arc::clone(&self.generation),
        };
        session.set_state(ConnectionState::Connecting);
        let handle = self.handle();
        let task = tokio::spawn(session.drive(outbound_rx));

        *self.lock_driver() = Some(Driver { task, outbound });
        handle
    }

    /// Tear down the connection. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        let driver = self.lock_driver().take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(driver) = driver {
            driver.task.abort();
            tracing::info!("Realtime channel disconnected");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Register the callback for `topic`, replacing any existing one.
    pub fn add_listener(&self, topic: Topic, callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static) {
        self.lock_handlers().insert(topic, Arc::new(callback));
    }

    pub fn remove_listener(&self, topic: Topic) {
        self.lock_handlers().remove(&topic);
    }

    /// Send an event to the server over the live connection.
    pub fn emit(&self, name: &str, payload: &Value) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(Error::Network("realtime channel is not connected".to_string()));
        }
        let driver = self.lock_driver();
        let Some(driver) = driver.as_ref() else {
            return Err(Error::Network("realtime channel is not connected".to_string()));
        };
        driver
            .outbound
            .send(frame::encode_event(name, payload))
            .map_err(|_| Error::Network("realtime channel is closed".to_string()))
    }

    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, HashMap<Topic, Handler>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_driver(&self) -> std::sync::MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(driver) = self.lock_driver().take() {
            driver.task.abort();
        }
    }
}

impl fmt::Debug for RealtimeChannel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RealtimeChannel")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// How a single connection attempt ended.
struct SessionEnd {
    reached_connected: bool,
    /// Server refused or closed the namespace; do not reconnect.
    terminal: bool,
    reason: String,
}

impl SessionEnd {
    fn retry(reached_connected: bool, reason: impl Into<String>) -> Self {
        Self {
            reached_connected,
            terminal: false,
            reason: reason.into(),
        }
    }

    fn stop(reached_connected: bool, reason: impl Into<String>) -> Self {
        Self {
            reached_connected,
            terminal: true,
            reason: reason.into(),
        }
    }
}

struct Session {
    url: String,
    token: String,
    user_id: RecordId,
    config: RealtimeConfig,
    handlers: Arc<Mutex<HashMap<Topic, Handler>>>,
    on_notification: NotificationHandler,
    state: Arc<watch::Sender<ConnectionState>>,
    generation: u64,
    current_generation: Arc<AtomicU64>,
}

impl Session {
    async fn drive(self, mut outbound: mpsc::UnboundedReceiver<String>) {
        let mut attempts = 0_u32;
        loop {
            self.set_state(ConnectionState::Connecting);
            let end = self.run_once(&mut outbound).await;
            if end.reached_connected {
                attempts = 0;
            }
            if end.terminal {
                tracing::warn!("Realtime connection closed by server: {}", end.reason);
                break;
            }
            if attempts >= self.config.reconnect_attempts {
                tracing::warn!(
                    attempts,
                    "Realtime connection lost, giving up: {}",
                    end.reason
                );
                break;
            }
            attempts += 1;
            tracing::info!(attempt = attempts, "Realtime connection lost ({}), reconnecting", end.reason);
            sleep(self.config.reconnect_delay).await;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    async fn run_once(&self, outbound: &mut mpsc::UnboundedReceiver<String>) -> SessionEnd {
        let deadline = Instant::now() + self.config.connect_timeout;
        let stream = match timeout(self.config.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(error)) => return SessionEnd::retry(false, error.to_string()),
            Err(_) => return SessionEnd::retry(false, "connect timed out"),
        };
        let (mut write, mut read) = stream.split();
        let mut connected = false;
        // pingInterval + pingTimeout from the open packet; none until it arrives.
        let mut liveness: Option<Duration> = None;
        let mut last_ping = Instant::now();

        loop {
            let ping_deadline = liveness.map(|window| last_ping + window);
            tokio::select! {
                incoming = read.next() => {
                    let text = match incoming {
                        None => return SessionEnd::retry(connected, "connection closed"),
                        Some(Err(error)) => return SessionEnd::retry(connected, error.to_string()),
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) => return SessionEnd::retry(connected, "connection closed"),
                        Some(Ok(_)) => continue,
                    };
                    let reply = match frame::decode(text.as_str()) {
                        Frame::Open(handshake) => {
                            let window = handshake.ping_interval.saturating_add(handshake.ping_timeout);
                            if window > 0 {
                                liveness = Some(Duration::from_millis(window));
                                last_ping = Instant::now();
                            }
                            Some(frame::encode_connect(&serde_json::json!({ "token": self.token })))
                        }
                        Frame::Ping => {
                            last_ping = Instant::now();
                            Some(frame::PONG.to_string())
                        }
                        Frame::Connect => {
                            connected = true;
                            self.set_state(ConnectionState::Connected);
                            tracing::info!(user = %self.user_id, "Realtime channel connected");
                            Some(frame::encode_event("join", &Value::String(self.user_id.to_string())))
                        }
                        Frame::Event { name, payload } => {
                            self.dispatch(&name, payload);
                            None
                        }
                        Frame::ConnectError(message) => return SessionEnd::stop(connected, message),
                        Frame::Disconnect => return SessionEnd::stop(connected, "namespace disconnect"),
                        Frame::Close => return SessionEnd::retry(connected, "transport close"),
                        Frame::Pong | Frame::Noop => None,
                        Frame::Unknown(raw) => {
                            tracing::debug!("Ignoring realtime frame: {}", raw);
                            None
                        }
                    };
                    if let Some(reply) = reply {
                        if let Err(error) = write.send(Message::Text(reply.into())).await {
                            return SessionEnd::retry(connected, error.to_string());
                        }
                    }
                }
                Some(message) = outbound.recv() => {
                    if connected {
                        if let Err(error) = write.send(Message::Text(message.into())).await {
                            return SessionEnd::retry(connected, error.to_string());
                        }
                    } else {
                        tracing::debug!("Dropping realtime emit while not connected");
                    }
                }
                () = sleep_until(deadline), if !connected => {
                    return SessionEnd::retry(false, "handshake timed out");
                }
                () = sleep_until(ping_deadline.unwrap_or(deadline)), if connected && ping_deadline.is_some() => {
                    return SessionEnd::retry(true, "ping timeout");
                }
            }
        }
    }

    fn dispatch(&self, name: &str, payload: Value) {
        let Some(topic) = Topic::from_wire(name) else {
            tracing::debug!(event = name, "Ignoring unknown realtime event");
            return;
        };
        if topic == Topic::Notification {
            (self.on_notification)(&payload);
            return;
        }

        let handler = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .cloned();
        let Some(handler) = handler else {
            return;
        };
        match RealtimeEvent::decode(topic, payload) {
            Ok(event) => handler(&event),
            Err(error) => tracing::warn!(topic = %topic, "Malformed realtime payload: {}", error),
        }
    }

    fn set_state(&self, next: ConnectionState) {
        if self.current_generation.load(Ordering::SeqCst) != self.generation {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let channel = RealtimeChannel::new("ws://127.0.0.1:9/socket.io/", RealtimeConfig::default());
        channel.disconnect();
        channel.disconnect();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn last_listener_wins_and_can_be_removed() {
        let channel = RealtimeChannel::new("ws://127.0.0.1:9/socket.io/", RealtimeConfig::default());
        channel.add_listener(Topic::TaskDeleted, |_| {});
        channel.add_listener(Topic::TaskDeleted, |_| {});
        assert_eq!(channel.lock_handlers().len(), 1);
        channel.remove_listener(Topic::TaskDeleted);
        assert!(channel.lock_handlers().is_empty());
    }

    #[tokio::test]
    async fn emit_requires_connection() {
        let channel = RealtimeChannel::new("ws://127.0.0.1:9/socket.io/", RealtimeConfig::default());
        assert!(channel.emit("join", &Value::Null).is_err());
    }
}
