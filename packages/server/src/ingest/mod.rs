//! Remote-image ingestion: resolve a user-supplied URL to image bytes,
//! validate them, and persist blob plus metadata as a pair.

mod error;
pub mod extract;
pub mod fetch;
pub mod media;
pub mod path;
pub mod saga;
pub mod url;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use snapvault_common::storage::{BlobKey, BlobSink, ContentHash, PutOptions};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, instrument, warn};
use uuid::Uuid;

pub use error::IngestError;


use crate::metadata::{MetadataStore, StoredAttachment};
use extract::extract_image_url;
use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};
use media::{ACCEPT_IMAGE, ACCEPT_PAGE_OR_IMAGE, ContentKind};
use path::MonotonicMillis;
use saga::{Saga, SagaStep};

/// One ingestion call. `caller_id` comes from a verified identity token.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub source_url: String,
    pub owner_entity_id: String,
    pub caller_id: String,
}

/// Image bytes ready for persistence. Only constructed once the content type
/// has been confirmed to be an image.
#[derive(Debug)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub declared_content_type: String,
    pub source_url_used: Url,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub blob_path: BlobKey,
    pub attachment: StoredAttachment,
}

pub struct IngestionService {
    fetcher: Arc<dyn Fetcher>,
    blobs: Arc<dyn BlobSink>,
    metadata: Arc<dyn MetadataStore>,
    clock: MonotonicMillis,
    max_image_bytes: u64,
}

impl IngestionService {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        blobs: Arc<dyn BlobSink>,
        metadata: Arc<dyn MetadataStore>,
        max_image_bytes: u64,
    ) -> Self {
        Self {
            fetcher,
            blobs,
            metadata,
            clock: MonotonicMillis::new(),
            max_image_bytes,
        }
    }

    #[instrument(skip(self, request), fields(owner_id = %request.owner_entity_id, caller_id = %request.caller_id))]
    pub async fn ingest(&self, request: IngestionRequest) -> Result<IngestOutcome, IngestError> {
        let source_url = validate(&request)?;

        info!("Downloading from URL: {source_url}");
        let content = self.resolve(&source_url).await?;
        self.persist(&request, content).await
    }

    /// Run [`ingest`](Self::ingest) on its own task.
    ///
    /// Dropping the returned handle does not stop the task, so a caller that
    /// goes away between the blob write and the record insert cannot leave
    /// an orphaned blob behind.
    pub fn spawn(
        self: &Arc<Self>,
        request: IngestionRequest,
    ) -> JoinHandle<Result<IngestOutcome, IngestError>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.ingest(request).await }.in_current_span())
    }

    /// Fetch the source URL and, for HTML pages, the image it points at.
    async fn resolve(&self, source_url: &Url) -> Result<FetchedContent, IngestError> {
        let response = self
            .fetcher
            .fetch(FetchRequest {
                url: source_url,
                accept: ACCEPT_PAGE_OR_IMAGE,
                referer: None,
                max_bytes: self.max_image_bytes,
            })
            .await
            .map_err(|e| match e {
                FetchError::TooLarge { limit } => IngestError::PayloadTooLarge { limit },
                other => IngestError::Transport(other.to_string()),
            })?;

        if !response.is_success() {
            return Err(IngestError::FetchFailed {
                status: response.status,
                reason: response.reason,
            });
        }

        let response = match media::classify(response.content_type.as_deref()) {
            ContentKind::Image => response,
            ContentKind::Html => self.extract(source_url, response).await?,
            ContentKind::Other => {
                warn!(content_type = ?response.content_type, "Unsupported content");
                return Err(IngestError::UnsupportedContent(response.content_type));
            }
        };

        self.validate_image(response)
    }

    async fn extract(
        &self,
        source_url: &Url,
        page: FetchResponse,
    ) -> Result<FetchResponse, IngestError> {
        info!("Got HTML response, parsing for image URL");
        let html = String::from_utf8_lossy(&page.body);

        let (strategy, image_url) =
            extract_image_url(&html, source_url).ok_or(IngestError::NoImageFound)?;
        info!(strategy = strategy.name(), "Final extracted image URL: {image_url}");

        let response = self
            .fetcher
            .fetch(FetchRequest {
                url: &image_url,
                accept: ACCEPT_IMAGE,
                referer: Some(source_url),
                max_bytes: self.max_image_bytes,
            })
            .await
            .map_err(|e| match e {
                FetchError::TooLarge { limit } => IngestError::PayloadTooLarge { limit },
                other => IngestError::ExtractionFailed(format!(
                    "Failed to download extracted image: {other}"
                )),
            })?;

        if !response.is_success() {
            return Err(IngestError::ExtractionFailed(format!(
                "Failed to download extracted image: {} {}",
                response.status, response.reason
            )));
        }
        if media::classify(response.content_type.as_deref()) != ContentKind::Image {
            return Err(IngestError::ExtractionFailed(
                "Extracted URL does not point to an image".into(),
            ));
        }

        Ok(response)
    }

    fn validate_image(&self, response: FetchResponse) -> Result<FetchedContent, IngestError> {
        if response.body.len() as u64 > self.max_image_bytes {
            return Err(IngestError::PayloadTooLarge {
                limit: self.max_image_bytes,
            });
        }

        let declared_content_type = response
            .content_type
            .as_deref()
            .map(media::essence)
            .ok_or_else(|| IngestError::UnsupportedContent(None))?;

        Ok(FetchedContent {
            bytes: response.body,
            declared_content_type,
            source_url_used: response.url,
        })
    }

    /// Write the blob, then the record. A failed record insert deletes the blob.
    async fn persist(
        &self,
        request: &IngestionRequest,
        content: FetchedContent,
    ) -> Result<IngestOutcome, IngestError> {
        let extension = media::extension_for(&content.declared_content_type);
        let blob_path = path::screenshot_key(
            &request.caller_id,
            &request.owner_entity_id,
            self.clock.next(),
            extension,
        )
        .map_err(|e| IngestError::StorageFailed(e.to_string()))?;

        let attachment = StoredAttachment {
            id: Uuid::now_v7(),
            owner_entity_id: request.owner_entity_id.clone(),
            caller_id: request.caller_id.clone(),
            blob_path: blob_path.to_string(),
            content_type: content.declared_content_type.clone(),
            size: i64::try_from(content.bytes.len()).unwrap_or(i64::MAX),
            content_hash: ContentHash::compute(&content.bytes).to_hex(),
            source_url: content.source_url_used.to_string(),
            created_at: Utc::now(),
        };

        info!("Uploading image to storage: {blob_path}");
        Saga::new()
            .step(PutBlob {
                sink: &*self.blobs,
                key: &blob_path,
                content: &content,
            })
            .step(InsertRecord {
                store: &*self.metadata,
                record: &attachment,
            })
            .run()
            .await?;

        info!("Screenshot saved successfully");
        Ok(IngestOutcome {
            blob_path,
            attachment,
        })
    }
}

fn validate(request: &IngestionRequest) -> Result<Url, IngestError> {
    if request.caller_id.trim().is_empty() {
        return Err(IngestError::Unauthorized);
    }

    let source = request.source_url.trim();
    let owner = request.owner_entity_id.trim();
    if source.is_empty() || owner.is_empty() {
        return Err(IngestError::BadRequest(
            "Missing imageUrl or interessentId".into(),
        ));
    }
    if !path::is_valid_segment(&request.owner_entity_id)
        || !path::is_valid_segment(&request.caller_id)
    {
        return Err(IngestError::BadRequest("Invalid interessentId".into()));
    }

    let url = Url::parse(source)
        .map_err(|e| IngestError::BadRequest(format!("Invalid imageUrl: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(IngestError::BadRequest(
            "imageUrl must use http or https".into(),
        ));
    }
    Ok(url)
}

struct PutBlob<'a> {
    sink: &'a dyn BlobSink,
    key: &'a BlobKey,
    content: &'a FetchedContent,
}

#[async_trait]
impl SagaStep for PutBlob<'_> {
    fn name(&self) -> &'static str {
        "put_blob"
    }

    async fn execute(&self) -> Result<(), IngestError> {
        self.sink
            .put(
                self.key,
                &self.content.bytes,
                &self.content.declared_content_type,
                PutOptions { overwrite: false },
            )
            .await
            .map_err(|e| {
                tracing::error!("Upload error: {e}");
                IngestError::StorageFailed(e.to_string())
            })
    }

    async fn compensate(&self) -> anyhow::Result<()> {
        let deleted = self.sink.delete(self.key).await?;
        if !deleted {
            warn!("Blob {} was already gone during cleanup", self.key);
        }
        Ok(())
    }
}

struct InsertRecord<'a> {
    store: &'a dyn MetadataStore,
    record: &'a StoredAttachment,
}

#[async_trait]
impl SagaStep for InsertRecord<'_> {
    fn name(&self) -> &'static str {
        "insert_record"
    }

    async fn execute(&self) -> Result<(), IngestError> {
        info!("Creating database entry");
        self.store.insert(self.record).await.map_err(|e| {
            tracing::error!("Database error: {e}");
            IngestError::MetadataFailed(e.to_string())
        })
    }
}
