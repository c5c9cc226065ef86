use thiserror::Error;

/// Every way a single ingestion can fail. All variants are terminal for the
/// invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing, malformed or rejected bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// The initial GET returned a non-success status.
    #[error("Failed to fetch URL: {status} {reason}")]
    FetchFailed { status: u16, reason: String },

    /// The initial GET never produced a response (DNS, connect, refused address).
    #[error("Failed to fetch URL: {0}")]
    Transport(String),

    /// The initial response was neither an image nor an HTML page.
    #[error("URL does not point to an image or HTML page")]
    UnsupportedContent(Option<String>),

    #[error("No image found in the HTML page")]
    NoImageFound,

    /// The page loaded, but the image extracted from it could not be used.
    #[error("{0}")]
    ExtractionFailed(String),

    #[error("Image is too large (max {})", human_size(*limit))]
    PayloadTooLarge { limit: u64 },

    #[error("Failed to upload image: {0}")]
    StorageFailed(String),

    /// The record insert failed after the blob was written.
    #[error("Failed to save to database: {0}")]
    MetadataFailed(String),
}

impl IngestError {
    /// Machine-readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::FetchFailed { .. } | Self::Transport(_) => "FETCH_FAILED",
            Self::UnsupportedContent(_) => "UNSUPPORTED_CONTENT",
            Self::NoImageFound => "NO_IMAGE_FOUND",
            Self::ExtractionFailed(_) => "EXTRACTION_FAILED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::StorageFailed(_) => "STORAGE_FAILED",
            Self::MetadataFailed(_) => "METADATA_FAILED",
        }
    }
}

fn human_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}
