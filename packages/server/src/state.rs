use std::sync::Arc;

use anyhow::Context;
use snapvault_common::storage::BlobSink;
use snapvault_common::storage::filesystem::FilesystemBlobSink;
use snapvault_common::storage::s3::S3BlobSink;
use snapvault_common::StorageBackend;

use crate::config::AppConfig;
use crate::database;
use crate::identity::{IdentityVerifier, JwtVerifier};
use crate::ingest::IngestionService;
use crate::ingest::fetch::{Fetcher, ReqwestFetcher};
use crate::metadata::{MemoryMetadataStore, MetadataStore, SeaOrmMetadataStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub identity: Arc<dyn IdentityVerifier>,
    pub blobs: Arc<dyn BlobSink>,
    pub metadata: Arc<dyn MetadataStore>,
    pub ingestion: Arc<IngestionService>,
}

impl AppState {
    /// Wire the service from explicit collaborators.
    pub fn new(
        config: AppConfig,
        identity: Arc<dyn IdentityVerifier>,
        fetcher: Arc<dyn Fetcher>,
        blobs: Arc<dyn BlobSink>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let ingestion = Arc::new(IngestionService::new(
            fetcher,
            blobs.clone(),
            metadata.clone(),
            config.ingest.max_image_bytes,
        ));
        Self {
            config,
            identity,
            blobs,
            metadata,
            ingestion,
        }
    }

    /// Build the production collaborators described by `config`.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&config.auth));

        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ReqwestFetcher::new(&config.ingest).context("Failed to build HTTP client")?,
        );

        let blobs: Arc<dyn BlobSink> = match config.storage.backend {
            StorageBackend::Filesystem => Arc::new(
                FilesystemBlobSink::new(config.storage.path.clone())
                    .await
                    .context("Failed to initialize filesystem storage")?,
            ),
            StorageBackend::S3 => Arc::new(
                S3BlobSink::new(&config.storage).context("Failed to initialize S3 storage")?,
            ),
        };

        let metadata: Arc<dyn MetadataStore> = if config.database.url == "memory" {
            tracing::warn!("Using in-memory metadata store; records are lost on restart");
            Arc::new(MemoryMetadataStore::new())
        } else {
            let db = database::init_db(&config.database.url)
                .await
                .context("Failed to connect to database")?;
            Arc::new(SeaOrmMetadataStore::new(db))
        };

        Ok(Self::new(config, identity, fetcher, blobs, metadata))
    }
}
