use std::sync::Arc;
use std::time::Duration;

use crate::ws::registry::SessionRegistry;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that sends periodic Ping frames to all
/// connected WebSocket clients.
///
/// The task runs until aborted during shutdown. The returned
/// `JoinHandle` can be used to abort it explicitly.
pub fn start_heartbeat(sessions: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let count = sessions.session_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            sessions.ping_all().await;
        }
    })
}
