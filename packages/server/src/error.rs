use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use snapvault_common::storage::StorageError;

use crate::ingest::IngestError;
use crate::metadata::MetadataError;
use crate::state::AppState;

/// Uniform error envelope returned by every endpoint on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    #[schema(example = false)]
    pub success: bool,
    /// Human-readable error description.
    #[schema(example = "No image found in the HTML page")]
    pub error: String,
    /// Machine-readable error code. One of: `UNAUTHORIZED`, `BAD_REQUEST`,
    /// `FETCH_FAILED`, `UNSUPPORTED_CONTENT`, `NO_IMAGE_FOUND`,
    /// `EXTRACTION_FAILED`, `PAYLOAD_TOO_LARGE`, `STORAGE_FAILED`,
    /// `METADATA_FAILED`, `NOT_FOUND`, `INTERNAL_ERROR`.
    #[schema(example = "NO_IMAGE_FOUND")]
    pub code: &'static str,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Ingest(IngestError),
    NotFound(String),
    Internal(String),
}

/// Marker attached to error responses so the status policy layer can find them.
#[derive(Clone, Copy, Debug)]
pub struct ErrorResponseMarker;

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, code, error) = match self {
            AppError::Ingest(err) => {
                let status = match &err {
                    IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
                    IngestError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    IngestError::FetchFailed { .. }
                    | IngestError::Transport(_)
                    | IngestError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
                    IngestError::UnsupportedContent(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    IngestError::NoImageFound => StatusCode::UNPROCESSABLE_ENTITY,
                    IngestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    IngestError::StorageFailed(_) | IngestError::MetadataFailed(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.code(), err.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".into(),
                )
            }
        };

        (
            status,
            ErrorBody {
                success: false,
                error,
                code,
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorResponseMarker);
        response
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError::Ingest(err)
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob not found: {key}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Collapse error statuses to 500 unless distinct statuses are enabled.
pub async fn apply_error_status_policy(
    State(state): State<AppState>,
    mut response: Response,
) -> Response {
    if !state.config.ingest.distinct_error_status
        && response.extensions().get::<ErrorResponseMarker>().is_some()
    {
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    }
    response
}
