use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use easel_core::executor::GraphExecutor;
use easel_queue::JobQueue;
use easel_store::AssetStore;
use easel_styles::StyleCatalog;

use crate::config::ServerConfig;
use crate::ws::SessionRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory job queue.
    pub queue: Arc<JobQueue>,
    /// WebSocket session registry (browser clients).
    pub sessions: Arc<SessionRegistry>,
    /// Sandboxed asset store.
    pub store: Arc<AssetStore>,
    /// Style catalog; behind a lock so it can be reloaded in place.
    pub styles: Arc<RwLock<StyleCatalog>>,
    /// The graph execution engine.
    pub executor: Arc<dyn GraphExecutor>,
    /// Monotonic submission counter; its value is the job's queue
    /// number and (possibly negated) priority.
    pub submission_counter: Arc<AtomicI64>,
}

impl AppState {
    /// Next submission number, starting at 1.
    pub fn next_number(&self) -> i64 {
        self.submission_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}
