//! Log stream socket
//!
//! Viewers connect, name the channels they want (`logs:{deploymentId}`),
//! and receive every payload published from then on as text frames. Frames
//! carry raw payloads in publish order — a frame is not guaranteed to be
//! exactly one line. Disconnecting tears down only this viewer's
//! forwarders; the publisher and other viewers never notice.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::server::state::StreamState;

/// Subscription request sent by the viewer as the first frame(s)
#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    #[serde(rename = "type")]
    kind: String,
    channel: String,
}

/// Build the stream socket router
pub fn stream_router(state: Arc<StreamState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<StreamState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<StreamState>) {
    let (mut sink, mut stream) = socket.split();

    // One outbound queue per viewer; forwarders from any number of
    // channels feed it.
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let Ok(request) = serde_json::from_str::<SubscribeRequest>(&text) else {
                    debug!("Ignoring unparseable frame: {}", text);
                    continue;
                };
                if request.kind != "subscribe" {
                    continue;
                }

                // Subscribe before acking: once the viewer sees the ack,
                // every later publish on the channel reaches it.
                forwarders.push(spawn_forwarder(&state, &request.channel, tx.clone()).await);

                let ack = json!({ "type": "joined", "channel": request.channel }).to_string();
                if tx.send(ack).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    // Viewer is gone: release its subscriptions promptly.
    for forwarder in forwarders {
        forwarder.abort();
    }
    drop(tx);
    let _ = writer.await;
}

/// Pipe one bus channel into this viewer's outbound queue
async fn spawn_forwarder(
    state: &Arc<StreamState>,
    channel: &str,
    tx: mpsc::Sender<String>,
) -> JoinHandle<()> {
    let mut receiver = state.bus.subscribe(channel).await;
    let channel = channel.to_string();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(payload) => {
                    if tx.send(payload).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Viewer lagged {} payloads behind on {}", missed, channel);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
