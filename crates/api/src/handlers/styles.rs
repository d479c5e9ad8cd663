//! Handlers for the style catalog listing and reload.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use serde::Serialize;

use easel_styles::StyleCatalog;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StyleItemView {
    pub name: String,
    /// Base64-encoded thumbnail bytes, or null when unreadable.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StyleGroupView {
    pub name: String,
    pub kind: &'static str,
    pub items: Vec<StyleItemView>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/styles
///
/// Groups in catalog order, each item with its thumbnail inlined as
/// base64. An unreadable thumbnail nulls that item's thumbnail rather
/// than failing the listing.
pub async fn get_styles(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    // Snapshot names and thumbnail paths under the read lock, do file
    // I/O after releasing it.
    let pending: Vec<(String, &'static str, Vec<(String, std::path::PathBuf)>)> = {
        let catalog = state.styles.read().await;
        catalog
            .groups()
            .iter()
            .map(|group| {
                (
                    group.name.clone(),
                    group.kind_name,
                    group
                        .items
                        .iter()
                        .map(|item| (item.name.clone(), catalog.base_dir().join(&item.thumbnail)))
                        .collect(),
                )
            })
            .collect()
    };

    let mut groups = Vec::with_capacity(pending.len());
    for (name, kind, items) in pending {
        let mut views = Vec::with_capacity(items.len());
        for (item_name, thumbnail_path) in items {
            let thumbnail = match tokio::fs::read(&thumbnail_path).await {
                Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                Err(e) => {
                    tracing::debug!(path = %thumbnail_path.display(), error = %e, "Thumbnail unreadable");
                    None
                }
            };
            views.push(StyleItemView {
                name: item_name,
                thumbnail,
            });
        }
        groups.push(StyleGroupView { name, kind, items: views });
    }

    Ok(Json(DataResponse { data: groups }))
}

/// POST /api/v1/styles/reload
///
/// Re-parse the catalog document. A malformed document leaves the
/// current catalog in place and reports the failure.
pub async fn reload_styles(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let reloaded = StyleCatalog::load(&state.config.styles_config)?;
    let (groups, styles) = (
        reloaded.groups().len(),
        reloaded.groups().iter().map(|g| g.items.len()).sum::<usize>(),
    );
    *state.styles.write().await = reloaded;
    tracing::info!(groups, styles, "Style catalog reloaded");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "groups": groups, "styles": styles }),
    }))
}
