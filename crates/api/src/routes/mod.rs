pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws?clientId=        live event channel (WebSocket)
///
/// /jobs                submit (POST, multipart)
/// /jobs/{id}           status snapshot (GET)
/// /jobs/{id}/result    one-shot result fetch (GET)
///
/// /queue               listing (GET), admin clear/delete (POST)
/// /interrupt           interrupt the running job (POST)
///
/// /history             listing (GET, ?max_items=), admin ops (POST)
/// /history/{id}        finished-job detail (GET)
///
/// /assets              upload (POST, multipart)
/// /assets/view         fetch with preview/channel options (GET)
/// /assets/remove       delete (POST)
///
/// /styles              catalog with base64 thumbnails (GET)
/// /styles/reload       re-parse the catalog document (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint.
        .route("/ws", get(ws::ws_handler))
        // Job submission and inspection.
        .route("/jobs", post(handlers::jobs::submit_job))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route("/jobs/{id}/result", get(handlers::jobs::get_job_result))
        // Queue listing and administration.
        .route(
            "/queue",
            get(handlers::queue::get_queue).post(handlers::queue::post_queue),
        )
        .route("/interrupt", post(handlers::queue::post_interrupt))
        // Finished-job history.
        .route(
            "/history",
            get(handlers::history::get_history).post(handlers::history::post_history),
        )
        .route("/history/{id}", get(handlers::history::get_history_detail))
        // Asset store.
        .route("/assets", post(handlers::assets::upload_asset))
        .route("/assets/view", get(handlers::assets::view_asset))
        .route("/assets/remove", post(handlers::assets::remove_asset))
        // Style catalog.
        .route("/styles", get(handlers::styles::get_styles))
        .route("/styles/reload", post(handlers::styles::reload_styles))
}
