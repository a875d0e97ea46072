//! Log relay integration tests
//!
//! Runs the stream socket server on an ephemeral port and drives it with a
//! plain WebSocket client: subscribe, publish through the bus, watch frames
//! arrive in order — and only frames published after joining.

use std::sync::Arc;

use berth::bus::{logs_channel, LogBus};
use berth::server::state::StreamState;
use berth::server::ws::stream_router;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

async fn start_stream_server(bus: Arc<LogBus>) -> String {
    let app = stream_router(Arc::new(StreamState::new(bus)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

#[tokio::test]
async fn test_late_subscriber_sees_only_later_lines_in_order() {
    let bus = Arc::new(LogBus::new());
    let url = start_stream_server(bus.clone()).await;

    // Published before anyone joined: gone, no backlog.
    bus.publish(&logs_channel("acme-site"), "early line".to_string()).await;

    let (mut socket, _) = connect_async(&url).await.unwrap();
    socket
        .send(Message::Text(
            r#"{"type":"subscribe","channel":"logs:acme-site"}"#.into(),
        ))
        .await
        .unwrap();

    let joined = socket.next().await.unwrap().unwrap();
    assert!(joined.into_text().unwrap().contains("joined"));

    for i in 0..5 {
        bus.publish(&logs_channel("acme-site"), format!("line {}", i)).await;
    }

    for i in 0..5 {
        let frame = socket.next().await.unwrap().unwrap();
        let text = frame.into_text().unwrap().to_string();
        assert_eq!(text, format!("line {}", i));
        assert!(!text.contains("early"));
    }

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn test_viewer_disconnect_leaves_publisher_and_peers_alone() {
    let bus = Arc::new(LogBus::new());
    let url = start_stream_server(bus.clone()).await;

    let (mut first, _) = connect_async(&url).await.unwrap();
    first
        .send(Message::Text(
            r#"{"type":"subscribe","channel":"logs:acme-site"}"#.into(),
        ))
        .await
        .unwrap();
    first.next().await.unwrap().unwrap();

    let (mut second, _) = connect_async(&url).await.unwrap();
    second
        .send(Message::Text(
            r#"{"type":"subscribe","channel":"logs:acme-site"}"#.into(),
        ))
        .await
        .unwrap();
    second.next().await.unwrap().unwrap();

    // First viewer goes away mid-stream.
    first.close(None).await.unwrap();
    drop(first);

    bus.publish(&logs_channel("acme-site"), "after disconnect".to_string()).await;

    let frame = second.next().await.unwrap().unwrap();
    assert_eq!(frame.into_text().unwrap().to_string(), "after disconnect");
}

#[tokio::test]
async fn test_one_viewer_can_watch_multiple_channels() {
    let bus = Arc::new(LogBus::new());
    let url = start_stream_server(bus.clone()).await;

    let (mut socket, _) = connect_async(&url).await.unwrap();
    for channel in ["logs:site-a", "logs:site-b"] {
        socket
            .send(Message::Text(
                format!(r#"{{"type":"subscribe","channel":"{}"}}"#, channel).into(),
            ))
            .await
            .unwrap();
        socket.next().await.unwrap().unwrap();
    }

    bus.publish(&logs_channel("site-a"), "from a".to_string()).await;
    bus.publish(&logs_channel("site-b"), "from b".to_string()).await;

    let mut received = Vec::new();
    for _ in 0..2 {
        received.push(socket.next().await.unwrap().unwrap().into_text().unwrap().to_string());
    }
    assert!(received.contains(&"from a".to_string()));
    assert!(received.contains(&"from b".to_string()));
}
