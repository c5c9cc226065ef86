use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use snapvault_common::storage::BlobKey;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::ingest::IngestionRequest;
use crate::models::screenshot::{
    SaveScreenshotRequest, SaveScreenshotResponse, ScreenshotListResponse, ScreenshotResponse,
};
use crate::state::AppState;

const SAVED_MESSAGE: &str = "Screenshot saved successfully";

#[utoipa::path(
    post,
    path = "/screenshots",
    tag = "Screenshots",
    operation_id = "saveScreenshot",
    summary = "Save a screenshot from a URL",
    description = "Downloads the image behind `imageUrl`. HTML pages are searched for an embedded \
        image (og:image, twitter:image, screenshot-host markup, first plausible <img>). \
        The image is stored under `{caller}/{interessentId}/{millis}.{ext}` and a metadata \
        record is written. A failed metadata write removes the stored blob. \
        Error statuses collapse to 500 unless distinct error statuses are enabled.",
    request_body = SaveScreenshotRequest,
    responses(
        (status = 200, description = "Screenshot stored", body = SaveScreenshotResponse),
        (status = 400, description = "Missing or invalid field (BAD_REQUEST)", body = ErrorBody),
        (status = 401, description = "Unauthorized (UNAUTHORIZED)", body = ErrorBody),
        (status = 413, description = "Image too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 415, description = "Neither image nor HTML (UNSUPPORTED_CONTENT)", body = ErrorBody),
        (status = 422, description = "No image in page (NO_IMAGE_FOUND)", body = ErrorBody),
        (status = 500, description = "Storage or metadata failure (STORAGE_FAILED, METADATA_FAILED)", body = ErrorBody),
        (status = 502, description = "Upstream failure (FETCH_FAILED, EXTRACTION_FAILED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn save_screenshot(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<SaveScreenshotRequest>,
) -> Result<Json<SaveScreenshotResponse>, AppError> {
    let request = IngestionRequest {
        owner_entity_id: payload.owner_id().unwrap_or_default(),
        source_url: payload.image_url.unwrap_or_default(),
        caller_id: auth_user.user_id,
    };

    let outcome = state
        .ingestion
        .spawn(request)
        .await
        .map_err(|e| AppError::Internal(format!("Ingestion task failed: {e}")))??;

    Ok(Json(SaveScreenshotResponse {
        success: true,
        file_name: outcome.blob_path.to_string(),
        message: SAVED_MESSAGE.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/screenshots/{owner_id}",
    tag = "Screenshots",
    operation_id = "listScreenshots",
    summary = "List the caller's screenshots for an entity",
    description = "Returns the caller's screenshot records for the entity, newest first.",
    params(("owner_id" = String, Path, description = "Owning entity ID")),
    responses(
        (status = 200, description = "Screenshot records", body = ScreenshotListResponse),
        (status = 401, description = "Unauthorized (UNAUTHORIZED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_screenshots(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<ScreenshotListResponse>, AppError> {
    let records = state
        .metadata
        .list_for_owner(&auth_user.user_id, &owner_id)
        .await?;

    let attachments: Vec<ScreenshotResponse> = records.into_iter().map(Into::into).collect();
    let total = attachments.len() as u64;
    Ok(Json(ScreenshotListResponse { attachments, total }))
}

#[utoipa::path(
    get,
    path = "/screenshots/{owner_id}/{id}/content",
    tag = "Screenshots",
    operation_id = "downloadScreenshot",
    summary = "Download a stored screenshot",
    description = "Returns the stored image bytes. Only the caller who saved the screenshot can \
        read it. Supports ETag-based caching via If-None-Match.",
    params(
        ("owner_id" = String, Path, description = "Owning entity ID"),
        ("id" = String, Path, description = "Screenshot record ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Image content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 401, description = "Unauthorized (UNAUTHORIZED)", body = ErrorBody),
        (status = 404, description = "Screenshot not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, headers), fields(user_id = %auth_user.user_id))]
pub async fn download_screenshot(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((owner_id, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("Screenshot not found".into());

    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    let record = state
        .metadata
        .get(&auth_user.user_id, id)
        .await?
        .filter(|r| r.owner_entity_id == owner_id)
        .ok_or_else(not_found)?;

    let etag_value = format!("\"{}\"", record.content_hash);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let key = BlobKey::new(record.blob_path.clone())?;
    let blob = state.blobs.get(&key).await?;
    let content_type = blob.content_type.unwrap_or(record.content_type);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, blob.bytes.len().to_string())
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(blob.bytes.into())
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
