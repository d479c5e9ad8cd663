//! Handlers for asset upload, fetch (with preview/channel options), and
//! removal.

use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use easel_core::assets::{AssetRef, Bucket};
use easel_core::error::CoreError;
use easel_store::{extract_channel, render_preview, Channel, PreviewFormat};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default bound on preview edge length.
const DEFAULT_PREVIEW_MAX: u32 = 512;

const DEFAULT_PREVIEW_QUALITY: u8 = 90;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /api/v1/assets
///
/// Multipart upload: `image` (required file), `type` (bucket, default
/// input), `subfolder`, `overwrite`. Responds with the reference the
/// asset landed under, which may carry a renamed filename.
pub async fn upload_asset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut filename = None;
    let mut bytes = None;
    let mut bucket = Bucket::default();
    let mut subfolder = String::new();
    let mut overwrite = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                filename = field.file_name().map(str::to_string);
                bytes = Some(field.bytes().await?.to_vec());
            }
            Some("type") => bucket = Bucket::from_name(&field.text().await?)?,
            Some("subfolder") => subfolder = field.text().await?,
            Some("overwrite") => {
                let value = field.text().await?;
                overwrite = matches!(value.as_str(), "1" | "true");
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| CoreError::Validation("Missing 'image' field".to_string()))?;
    let filename = filename.unwrap_or_else(|| "upload.png".to_string());

    let asset = state
        .store
        .store(bucket, &subfolder, &filename, &bytes, overwrite)
        .await?;
    tracing::info!(asset = %asset.display_path(), size = bytes.len(), "Asset uploaded");
    Ok(Json(DataResponse { data: asset }))
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Query parameters for GET /assets/view.
#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub name: String,
    #[serde(rename = "type")]
    pub bucket: Option<String>,
    pub subfolder: Option<String>,
    /// `"<format>"` or `"<format>;<quality>"`, e.g. `webp;80`.
    pub preview: Option<String>,
    /// Edge-length bound for previews.
    pub max_size: Option<u32>,
    /// `rgb` or `a`.
    pub channel: Option<String>,
}

/// GET /api/v1/assets/view
///
/// Raw bytes by default; `preview=` re-encodes downscaled, `channel=`
/// extracts color or alpha planes as PNG. The two compose: with both,
/// the channel is extracted first and the preview re-encodes the
/// extracted plane. Containment is re-verified on every fetch.
pub async fn view_asset(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> AppResult<Response> {
    let bucket = match &query.bucket {
        Some(name) => Bucket::from_name(name)?,
        None => Bucket::default(),
    };
    let asset = AssetRef::new(
        bucket,
        query.subfolder.clone().unwrap_or_default(),
        query.name.clone(),
    );
    let bytes = state.store.load(&asset).await?;

    let bytes = match &query.channel {
        Some(channel) => extract_channel(&bytes, Channel::from_name(channel)?)?,
        None => bytes,
    };

    if let Some(preview) = &query.preview {
        let (format, quality) = parse_preview_spec(preview)?;
        let max = query.max_size.unwrap_or(DEFAULT_PREVIEW_MAX);
        let encoded = render_preview(&bytes, format, quality, Some(max))?;
        return Ok(image_response(format.content_type(), encoded));
    }

    if query.channel.is_some() {
        return Ok(image_response("image/png", bytes));
    }

    let content_type = easel_store::content_type(&asset.filename);
    Ok(image_response(&content_type, bytes))
}

/// Split a `format;quality` preview spec.
fn parse_preview_spec(spec: &str) -> Result<(PreviewFormat, u8), CoreError> {
    let (format, quality) = match spec.split_once(';') {
        Some((format, quality)) => {
            let quality: u8 = quality.parse().map_err(|_| {
                CoreError::Validation(format!("Invalid preview quality '{quality}'"))
            })?;
            (format, quality)
        }
        None => (spec, DEFAULT_PREVIEW_QUALITY),
    };
    Ok((PreviewFormat::from_name(format)?, quality))
}

fn image_response(content_type: &str, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response()
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// POST /api/v1/assets/remove
///
/// Body is an asset reference (`type`, `subfolder`, `name`). A missing
/// asset is not an error.
pub async fn remove_asset(
    State(state): State<AppState>,
    Json(asset): Json<AssetRef>,
) -> AppResult<impl IntoResponse> {
    let removed = state.store.remove(&asset).await?;
    tracing::info!(asset = %asset.display_path(), removed, "Asset removal requested");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "removed": removed }),
    }))
}
