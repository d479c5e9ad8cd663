use std::net::SocketAddr;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easel_api::config::ServerConfig;
use easel_api::engine::{start_dispatcher, SimulatedExecutor};
use easel_api::router::build_app_router;
use easel_api::state::AppState;
use easel_api::ws;

use easel_queue::JobQueue;
use easel_store::{AssetStore, StoreRoots};
use easel_styles::StyleCatalog;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "easel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Asset store ---
    let store = Arc::new(
        AssetStore::open(StoreRoots {
            input: config.input_root.clone(),
            output: config.output_root.clone(),
            temp: config.temp_root.clone(),
        })
        .await
        .expect("Failed to open asset store"),
    );
    tracing::info!("Asset store opened");

    // --- Style catalog ---
    let styles = StyleCatalog::load(&config.styles_config).expect("Failed to load style catalog");

    // --- Queue + sessions ---
    let queue = Arc::new(JobQueue::new());
    let sessions = Arc::new(ws::SessionRegistry::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&sessions));

    // --- Execution engine ---
    let executor = Arc::new(SimulatedExecutor::new(Arc::clone(&store)));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        queue: Arc::clone(&queue),
        sessions: Arc::clone(&sessions),
        store,
        styles: Arc::new(RwLock::new(styles)),
        executor,
        submission_counter: Arc::new(AtomicI64::new(0)),
    };

    // --- Dispatcher ---
    let dispatcher_cancel = tokio_util::sync::CancellationToken::new();
    let dispatcher_handle = start_dispatcher(state.clone(), dispatcher_cancel.clone());
    tracing::info!("Dispatcher started");

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the dispatcher; its in-flight job finishes first.
    dispatcher_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await;
    tracing::info!("Dispatcher stopped");

    let session_count = sessions.session_count().await;
    tracing::info!(session_count, "Closing remaining WebSocket sessions");
    sessions.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
