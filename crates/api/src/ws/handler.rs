use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::registry::{Registration, SessionRegistry};
use crate::ws::status_event;

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session id to reconnect under; omitted on first connect.
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the session is registered with the
/// [`SessionRegistry`] and managed by two tasks (sender + receiver).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.client_id))
}

/// Manage a single WebSocket session after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the session (evicting a prior holder of the same id).
///   2. Sends the initial `status` snapshot with the assigned id.
///   3. Spawns a sender task that forwards channel messages to the sink.
///   4. Processes inbound messages on the current task.
///   5. Cleans up on disconnect, generation-checked.
async fn handle_socket(socket: WebSocket, state: AppState, requested_id: Option<String>) {
    let Registration {
        session_id,
        generation,
        receiver: mut rx,
    } = state.sessions.register(requested_id).await;
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // Initial snapshot: queue depth plus the id the client must use on
    // reconnect.
    let remaining = state.queue.tasks_remaining().await;
    let hello = status_event(remaining, Some(&session_id));
    if let Ok(text) = serde_json::to_string(&hello) {
        if sink.send(Message::Text(text.into())).await.is_err() {
            finish(&state.sessions, &session_id, generation).await;
            return;
        }
    }

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_session = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %sender_session, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(_msg) => {
                // Clients only listen on this channel.
            }
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    finish(&state.sessions, &session_id, generation).await;
    send_task.abort();
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

async fn finish(sessions: &Arc<SessionRegistry>, session_id: &str, generation: u64) {
    sessions.unregister(session_id, generation).await;
}
