//! End-to-end runs against loopback HTTP and WebSocket servers.

use futures::SinkExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};
use tokio_tungstenite::tungstenite::Message;
use touchify_sync::{
    AttendanceStatus, AttendanceView, EndpointConfig, SnapshotLoader, SyncClient, SyncConfig,
    SyncError, SyncEvent,
};

const ROSTER: &str = r#"[{"id":"F1","name":"Alice","class":"10","section":"A","status":"Absent"}]"#;
const EVENT: &str = r#"{"type":"biometric_event","data":{"finger_id":"F1"},"timestamp":"2026-01-01 09:05:30"}"#;

/// Serve a single HTTP response, then stop.
async fn serve_http_once(status_line: &'static str, body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind http");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept http");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.expect("write response");
        stream.shutdown().await.ok();
    });

    port
}

fn config_for(snapshot_port: u16, stream_port: u16) -> SyncConfig {
    SyncConfig {
        snapshot: EndpointConfig::new("127.0.0.1", snapshot_port, "/students"),
        stream: EndpointConfig::new("127.0.0.1", stream_port, "/ws/attendance"),
        reconnect_delay_ms: 200,
        marker_window_ms: 2000,
        request_timeout_ms: 5000,
    }
}

async fn wait_for(
    client: &SyncClient,
    predicate: impl FnMut(&AttendanceView) -> bool,
) -> AttendanceView {
    let mut rx = client.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for view")
        .expect("sync task alive");
    view.clone()
}

#[tokio::test]
async fn snapshot_then_stream_event_end_to_end() {
    let http_port = serve_http_once("HTTP/1.1 200 OK", ROSTER).await;

    let ws_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws");
    let ws_port = ws_listener.local_addr().unwrap().port();
    let (go_tx, go_rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = ws_listener.accept().await.expect("accept ws");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws handshake");
        go_rx.await.ok();
        ws.send(Message::Text("{not json".to_string().into()))
            .await
            .expect("send junk");
        ws.send(Message::Text(EVENT.to_string().into()))
            .await
            .expect("send event");
        // hold the socket open until the test is done
        done_rx.await.ok();
    });

    let config = config_for(http_port, ws_port);
    let mut client = SyncClient::spawn(&config);
    let loader = SnapshotLoader::from_config(&config);

    let count = assert_ok!(client.load_snapshot(&loader).await);
    assert_eq!(count, 1);
    wait_for(&client, |v| v.connected).await;
    go_tx.send(()).unwrap();

    let view = wait_for(&client, |v| v.is_touched("F1")).await;
    let record = view.record("F1").unwrap();
    assert_eq!(record.id, "F1");
    assert_eq!(record.status, AttendanceStatus::Present);
    assert_eq!(record.last_event_time.as_deref(), Some("09:05:30"));
    assert!(view.connected);

    client.shutdown().await;
    done_tx.send(()).ok();
}

#[tokio::test]
async fn server_close_triggers_reconnect() {
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws");
    let ws_port = ws_listener.local_addr().unwrap().port();
    let (done_tx, done_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = ws_listener.accept().await.expect("accept first");
        let mut first = tokio_tungstenite::accept_async(stream)
            .await
            .expect("first handshake");
        first.close(None).await.ok();

        let (stream, _) = ws_listener.accept().await.expect("accept second");
        let _second = tokio_tungstenite::accept_async(stream)
            .await
            .expect("second handshake");
        done_rx.await.ok();
    });

    let mut client = SyncClient::spawn(&config_for(1, ws_port));
    let mut events = client.events();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut connects = 0;
    let mut dropped_between = false;
    while connects < 2 {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("timed out waiting for reconnect")
            .expect("event stream open");
        match event {
            SyncEvent::Connected => connects += 1,
            SyncEvent::Disconnected { .. } if connects == 1 => dropped_between = true,
            _ => {}
        }
    }
    assert!(dropped_between);
    wait_for(&client, |v| v.connected).await;

    client.shutdown().await;
    assert!(!client.is_connected());
    done_tx.send(()).ok();
}

#[tokio::test]
async fn close_frame_from_server_disconnects_while_socket_held() {
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws");
    let ws_port = ws_listener.local_addr().unwrap().port();
    let (go_tx, go_rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = ws_listener.accept().await.expect("accept ws");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws handshake");
        go_rx.await.ok();
        ws.close(None).await.ok();
        // keep both the socket and the listener open
        let _held = (ws, ws_listener);
        done_rx.await.ok();
    });

    let mut client = SyncClient::spawn(&config_for(1, ws_port));
    let mut events = client.events();
    wait_for(&client, |v| v.connected).await;
    go_tx.send(()).unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.expect("event stream open") {
                SyncEvent::Disconnected { reason } => break reason,
                _ => continue,
            }
        }
    })
    .await
    .expect("no disconnect after Close frame");
    assert_eq!(reason, "closed by peer");
    assert!(!client.is_connected());

    client.shutdown().await;
    done_tx.send(()).ok();
}

#[tokio::test]
async fn failed_snapshot_surfaces_to_caller_and_keeps_store_empty() {
    let http_port = serve_http_once("HTTP/1.1 500 Internal Server Error", r#"{"detail":"boom"}"#).await;
    let config = config_for(http_port, 1);
    let mut client = SyncClient::spawn(&config);

    let err = assert_err!(client.load_snapshot(&SnapshotLoader::from_config(&config)).await);
    assert!(matches!(err, SyncError::Transport { .. }));
    assert!(client.view().records.is_empty());
    assert!(!client.is_connected());

    client.shutdown().await;
}
