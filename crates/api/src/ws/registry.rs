use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use easel_core::events::encode_binary_frame;
use easel_core::types::{SessionId, Timestamp};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type SessionSender = mpsc::UnboundedSender<Message>;

/// One live WebSocket session.
struct SessionEntry {
    sender: SessionSender,
    /// Distinguishes this channel from any earlier holder of the same
    /// session id, so a stale disconnect cleanup cannot remove a
    /// replacement.
    generation: u64,
    /// When this session was established.
    #[allow(dead_code)]
    connected_at: Timestamp,
}

/// Handle returned by [`SessionRegistry::register`].
pub struct Registration {
    pub session_id: SessionId,
    pub generation: u64,
    /// Receiver half for the socket sender task.
    pub receiver: mpsc::UnboundedReceiver<Message>,
}

/// Manages all active WebSocket sessions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application. Sends are fire-and-forget: a
/// closed or missing channel is logged at debug level and skipped.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    generations: AtomicU64,
}

impl SessionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Register a session, generating an id when the client did not
    /// reconnect with one.
    ///
    /// Reconnecting with an existing id evicts the previous holder: its
    /// channel gets a Close frame and all future events go to the new
    /// channel.
    pub async fn register(&self, requested_id: Option<String>) -> Registration {
        let session_id = requested_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let entry = SessionEntry {
            sender: tx,
            generation,
            connected_at: chrono::Utc::now(),
        };
        let evicted = self.sessions.write().await.insert(session_id.clone(), entry);
        if let Some(old) = evicted {
            let _ = old.sender.send(Message::Close(None));
            tracing::info!(session_id = %session_id, "Evicted previous session holder");
        }

        Registration {
            session_id,
            generation,
            receiver: rx,
        }
    }

    /// Remove a session, but only if `generation` still matches.
    ///
    /// An evicted connection's cleanup thereby never removes the
    /// channel that replaced it.
    pub async fn unregister(&self, session_id: &str, generation: u64) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|e| e.generation == generation)
        {
            sessions.remove(session_id);
        }
    }

    /// Send a JSON event to one session. Returns whether a live channel
    /// accepted it; failures are logged and swallowed.
    pub async fn send_json<T: Serialize>(&self, session_id: &str, event: &T) -> bool {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize event");
                return false;
            }
        };
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(entry) => {
                let accepted = entry.sender.send(Message::Text(text.into())).is_ok();
                if !accepted {
                    tracing::debug!(session_id = %session_id, "Dropped event for closed session");
                }
                accepted
            }
            None => {
                tracing::debug!(session_id = %session_id, "Dropped event for missing session");
                false
            }
        }
    }

    /// Send a tagged binary frame to one session.
    pub async fn send_binary(&self, session_id: &str, tag: u32, payload: &[u8]) -> bool {
        let frame = encode_binary_frame(tag, payload);
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(entry) => entry
                .sender
                .send(Message::Binary(Bytes::from(frame)))
                .is_ok(),
            None => false,
        }
    }

    /// Broadcast a JSON event to all sessions.
    ///
    /// Sessions whose send channels are closed are silently skipped
    /// (they are cleaned up when their receive loop exits).
    pub async fn broadcast_json<T: Serialize>(&self, event: &T) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize event");
                return;
            }
        };
        let sessions = self.sessions.read().await;
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Text(text.clone().into()));
        }
    }

    /// Return the current number of active sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for entry in sessions.values() {
            let _ = entry.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all WebSocket sessions");
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
