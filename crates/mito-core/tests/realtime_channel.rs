//! Realtime channel against an in-process Socket.IO-speaking server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use mito_core::config::RealtimeConfig;
use mito_core::models::RecordId;
use mito_core::realtime::{ConnectionState, RealtimeChannel, RealtimeEvent, Topic};

const WAIT: Duration = Duration::from_secs(5);

fn fast_config(reconnect_attempts: u32) -> RealtimeConfig {
    RealtimeConfig {
        reconnect_attempts,
        reconnect_delay: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(2),
    }
}

async fn next_text(socket: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let message = timeout(WAIT, socket.next())
            .await
            .expect("client message in time")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(text) = message {
            return text.as_str().to_string();
        }
    }
}

async fn send_text(socket: &mut WebSocketStream<TcpStream>, text: &str) {
    socket
        .send(Message::Text(text.to_string().into()))
        .await
        .expect("send to client");
}

/// Accept one client and complete the Engine.IO + Socket.IO handshake.
/// Returns the socket and the `join` event the client emitted.
async fn accept_and_handshake(listener: &TcpListener) -> (WebSocketStream<TcpStream>, String) {
    accept_with_open(
        listener,
        r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#,
    )
    .await
}

async fn accept_with_open(
    listener: &TcpListener,
    open: &str,
) -> (WebSocketStream<TcpStream>, String) {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("client connects in time")
        .expect("accept");
    let mut socket = accept_async(stream).await.expect("websocket handshake");

    send_text(&mut socket, open).await;
    assert_eq!(next_text(&mut socket).await, r#"40{"token":"secret"}"#);
    send_text(&mut socket, r#"40{"sid":"n1"}"#).await;
    let join = next_text(&mut socket).await;
    (socket, join)
}

fn ws_url(listener: &TcpListener) -> String {
    format!(
        "ws://{}/socket.io/?EIO=4&transport=websocket",
        listener.local_addr().unwrap()
    )
}

#[tokio::test]
async fn dispatches_events_to_registered_handlers() {
    common::init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = RealtimeChannel::new(ws_url(&listener), fast_config(0));

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    channel.add_listener(Topic::TaskDeleted, move |event| {
        let _ = events_tx.send(event.clone());
    });
    let (notes_tx, mut notes_rx) = mpsc::unbounded_channel();
    let mut handle = channel.connect("secret", &RecordId::from("u1"), move |payload| {
        let _ = notes_tx.send(payload.clone());
    });

    let (mut socket, join) = accept_and_handshake(&listener).await;
    assert_eq!(join, r#"42["join","u1"]"#);
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Connected)).await.unwrap());

    send_text(&mut socket, "2").await;
    assert_eq!(next_text(&mut socket).await, "3");

    send_text(&mut socket, r#"42["comment_deleted",{"commentId":1}]"#).await;
    send_text(&mut socket, r#"42["unknown_event",{}]"#).await;
    // Undecodable payload for a typed topic: dropped, channel stays up.
    send_text(&mut socket, r#"42["task_deleted","not an object"]"#).await;
    send_text(&mut socket, r#"42["task_deleted",{"taskId":3}]"#).await;
    send_text(&mut socket, r#"42["notification",{"title":"Assigned"}]"#).await;

    let event = timeout(WAIT, events_rx.recv()).await.unwrap().unwrap();
    match event {
        RealtimeEvent::TaskDeleted(deleted) => assert_eq!(deleted.task_id.as_str(), "3"),
        other => panic!("unexpected event {other:?}"),
    }
    let note: Value = timeout(WAIT, notes_rx.recv()).await.unwrap().unwrap();
    assert_eq!(note, json!({"title": "Assigned"}));

    channel.emit("typing", &json!({"taskId": 3})).unwrap();
    assert_eq!(next_text(&mut socket).await, r#"42["typing",{"taskId":3}]"#);

    channel.disconnect();
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    channel.disconnect();
}

#[tokio::test]
async fn reconnects_after_the_server_drops_the_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = RealtimeChannel::new(ws_url(&listener), fast_config(3));
    let mut handle = channel.connect("secret", &RecordId::from(9), |_| {});

    let (socket, join) = accept_and_handshake(&listener).await;
    assert_eq!(join, r#"42["join","9"]"#);
    drop(socket);

    let (_socket, join) = accept_and_handshake(&listener).await;
    assert_eq!(join, r#"42["join","9"]"#);
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Connected)).await.unwrap());
    channel.disconnect();
}

#[tokio::test]
async fn gives_up_after_bounded_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = ws_url(&listener);
    drop(listener);

    let channel = RealtimeChannel::new(url, fast_config(2));
    let mut handle = channel.connect("secret", &RecordId::from("u1"), |_| {});
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Disconnected))
        .await
        .unwrap());
    assert_eq!(channel.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnects_when_the_server_stops_pinging() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = RealtimeChannel::new(ws_url(&listener), fast_config(3));
    let mut handle = channel.connect("secret", &RecordId::from("u1"), |_| {});

    // The socket stays open but no ping ever follows the handshake.
    let (_silent, _join) = accept_with_open(
        &listener,
        r#"0{"sid":"s1","upgrades":[],"pingInterval":100,"pingTimeout":100}"#,
    )
    .await;
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Connected)).await.unwrap());
    assert_eq!(
        timeout(WAIT, handle.changed()).await.unwrap(),
        Some(ConnectionState::Connecting)
    );

    let (_socket, join) = accept_and_handshake(&listener).await;
    assert_eq!(join, r#"42["join","u1"]"#);
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Connected)).await.unwrap());
    channel.disconnect();
}

#[tokio::test]
async fn pings_keep_the_connection_alive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = RealtimeChannel::new(ws_url(&listener), fast_config(3));
    let mut handle = channel.connect("secret", &RecordId::from("u1"), |_| {});

    let (mut socket, _join) = accept_with_open(
        &listener,
        r#"0{"sid":"s1","upgrades":[],"pingInterval":100,"pingTimeout":100}"#,
    )
    .await;
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Connected)).await.unwrap());

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        send_text(&mut socket, "2").await;
        assert_eq!(next_text(&mut socket).await, "3");
    }
    assert_eq!(channel.state(), ConnectionState::Connected);
    assert!(timeout(Duration::from_millis(50), listener.accept())
        .await
        .is_err());
    channel.disconnect();
}

#[tokio::test]
async fn connects_once_plus_each_reconnect_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = ws_url(&listener);
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    let server = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let channel = RealtimeChannel::new(url, fast_config(5));
    let mut handle = channel.connect("secret", &RecordId::from("u1"), |_| {});
    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Disconnected))
        .await
        .unwrap());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
    server.abort();
}

#[tokio::test]
async fn connect_error_is_terminal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = RealtimeChannel::new(ws_url(&listener), fast_config(5));
    let mut handle = channel.connect("secret", &RecordId::from("u1"), |_| {});

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut socket = accept_async(stream).await.unwrap();
    send_text(&mut socket, r#"0{"sid":"s1"}"#).await;
    let _connect = next_text(&mut socket).await;
    send_text(&mut socket, r#"44{"message":"Authentication error"}"#).await;

    assert!(timeout(WAIT, handle.wait_for(ConnectionState::Disconnected))
        .await
        .unwrap());
    // No second attempt.
    assert!(timeout(Duration::from_millis(200), listener.accept())
        .await
        .is_err());
}
