//! WebSocket infrastructure for live progress delivery.
//!
//! Provides the session registry (one channel per client id, eviction
//! on reconnect), heartbeat monitoring, and the HTTP upgrade handler
//! used by Axum routes.

mod handler;
mod heartbeat;
pub mod registry;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use registry::SessionRegistry;

use serde_json::json;

/// Build a `status` event: queue depth plus, on initial connect, the
/// session id the client must present on reconnect.
pub fn status_event(queue_remaining: usize, sid: Option<&str>) -> serde_json::Value {
    let mut data = json!({
        "status": { "exec_info": { "queue_remaining": queue_remaining } },
    });
    if let Some(sid) = sid {
        data["sid"] = json!(sid);
    }
    json!({ "type": "status", "data": data })
}
