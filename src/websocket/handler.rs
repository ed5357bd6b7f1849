use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::connection::ConnectionHandle;
use crate::metrics::ConnectionMetrics;
use crate::presence::{Identity, SessionState};
use crate::server::AppState;

use super::message::{ClientMessage, OutboundMessage, ServerMessage};

/// Handshake parameters carried on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl WsQuery {
    /// Identity claimed by the client; `None` for anonymous visitors
    pub fn identity(&self) -> Option<Identity> {
        self.user_id.as_deref().and_then(Identity::parse)
    }
}

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state, query))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let identity = query.identity();
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handle an established WebSocket connection
#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state, identity),
    fields(user_id = identity.as_ref().map(|i| i.as_str()).unwrap_or("-"))
)]
async fn handle_socket(socket: WebSocket, state: AppState, identity: Option<Identity>) {
    let connection_start = std::time::Instant::now();

    // Channel for sending messages to this connection
    let (tx, mut rx) =
        mpsc::channel::<OutboundMessage>(state.settings.websocket.channel_buffer_size);
    let handle = Arc::new(ConnectionHandle::new(tx));
    let connection_id = handle.id;

    // Frames queued by on_open (our own presence announcement) wait in rx
    let lifecycle = state.hub.lifecycle().clone();
    let session = lifecycle.on_open(handle.clone(), identity);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    tracing::info!(
        connection_id = %connection_id,
        identified = matches!(session, SessionState::Identified(_)),
        "WebSocket connection established"
    );

    // Task for sending messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Task for receiving messages from WebSocket
    let recv_handle = handle.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &recv_handle) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then stop the other
    let send_abort = send_task.abort_handle();
    let recv_abort = recv_task.abort_handle();
    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_abort.abort();
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_abort.abort();
        }
    }

    lifecycle.on_close(&handle, session);

    let duration = connection_start.elapsed().as_secs_f64();
    ConnectionMetrics::observe_duration(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// Process a received WebSocket message
/// Returns false if the connection should be closed
fn process_message(msg: Message, handle: &Arc<ConnectionHandle>) -> bool {
    match msg {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    let _ = handle.try_send(ServerMessage::pong());
                }
                Err(e) => {
                    tracing::debug!(connection_id = %handle.id, error = %e, "Failed to parse client message");
                    let _ = handle.try_send(ServerMessage::error("INVALID_MESSAGE", e.to_string()));
                }
            }
            true
        }
        Message::Binary(_) => {
            let _ = handle.try_send(ServerMessage::error(
                "UNSUPPORTED_FORMAT",
                "Binary messages are not supported",
            ));
            true
        }
        // Axum answers pings automatically
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            false
        }
    }
}
