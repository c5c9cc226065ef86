use async_trait::async_trait;

use super::error::StorageError;
use super::key::BlobKey;

/// Write options for [`BlobSink::put`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    /// Replace an existing blob at the same path. When false, a write to an
    /// existing path fails with [`StorageError::AlreadyExists`].
    pub overwrite: bool,
}

/// A blob read back from a sink.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Path-addressed binary object storage.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Store `data` at `key`, declaring its content type.
    async fn put(
        &self,
        key: &BlobKey,
        data: &[u8],
        content_type: &str,
        options: PutOptions,
    ) -> Result<(), StorageError>;

    async fn get(&self, key: &BlobKey) -> Result<StoredBlob, StorageError>;

    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError>;
}
