//! WebSocket event stream
//!
//! Pushes a typed event for every state transition, trade execution and
//! alert: `{type: info|error|trade|alert, message, timestamp}`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::api::ApiState;
use crate::network::event_bus::EventProcessor;

/// Wire format consumed by the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: i64,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut processor = EventProcessor::from_sender(&state.event_tx, "ws-client");

    let forward = tokio::spawn(async move {
        while let Some(event) = processor.next().await {
            let payload = StreamEvent {
                kind: event.kind().to_string(),
                message: event.summary(),
                timestamp: chrono::Utc::now().timestamp(),
            };
            let text = match serde_json::to_string(&payload) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Drain the client side until it disconnects
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }

    forward.abort();
    debug!("WebSocket client disconnected");
}
