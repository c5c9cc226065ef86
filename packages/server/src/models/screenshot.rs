use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::StoredAttachment;

/// Request body for saving a screenshot from a URL.
///
/// Both fields are optional at the JSON level so that a missing field is
/// reported as `BAD_REQUEST` rather than a deserialization error.
#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveScreenshotRequest {
    /// Direct image link or a page that embeds the image.
    #[schema(example = "https://prntscr.com/abc123")]
    pub image_url: Option<String>,
    /// Owning entity the screenshot attaches to.
    #[serde(alias = "ownerEntityId")]
    #[schema(example = "42")]
    pub interessent_id: Option<serde_json::Value>,
}

impl SaveScreenshotRequest {
    /// The owner id as a string; numeric ids are accepted too.
    pub fn owner_id(&self) -> Option<String> {
        match self.interessent_id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveScreenshotResponse {
    #[schema(example = true)]
    pub success: bool,
    /// Blob path of the stored image.
    #[schema(example = "3f1c9a2e-0b7d-4c1e-9a57-2d9e1f0c8b11/42/1718000000000.png")]
    pub file_name: String,
    #[schema(example = "Screenshot saved successfully")]
    pub message: String,
}

/// Response DTO for a single stored screenshot.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ScreenshotResponse {
    /// Record ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    pub owner_entity_id: String,
    /// Blob path, `{caller}/{owner}/{millis}.{ext}`.
    pub blob_path: String,
    #[schema(example = "image/png")]
    pub content_type: String,
    /// Size in bytes.
    #[schema(example = 51200)]
    pub size: i64,
    /// SHA-256 content hash.
    pub content_hash: String,
    /// URL the image was downloaded from.
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ScreenshotListResponse {
    pub attachments: Vec<ScreenshotResponse>,
    pub total: u64,
}

impl From<StoredAttachment> for ScreenshotResponse {
    fn from(record: StoredAttachment) -> Self {
        Self {
            id: record.id.to_string(),
            owner_entity_id: record.owner_entity_id,
            blob_path: record.blob_path,
            content_type: record.content_type,
            size: record.size,
            content_hash: record.content_hash,
            source_url: record.source_url,
            created_at: record.created_at,
        }
    }
}
