use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::key::BlobKey;
use super::traits::{BlobSink, PutOptions, StoredBlob};

const TEMP_DIR: &str = ".tmp";
const META_DIR: &str = ".meta";

/// Filesystem-backed blob sink.
///
/// Blobs live at `{base_path}/{key}`. The declared content type of each blob
/// is kept in a sidecar under `{base_path}/.meta/{key}`. Keys never start a
/// segment with `.`, so the two trees cannot collide.
pub struct FilesystemBlobSink {
    base_path: PathBuf,
}

impl FilesystemBlobSink {
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(TEMP_DIR)).await?;
        fs::create_dir_all(base_path.join(META_DIR)).await?;
        Ok(Self { base_path })
    }

    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        key.segments()
            .fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    fn meta_path(&self, key: &BlobKey) -> PathBuf {
        key.segments()
            .fold(self.base_path.join(META_DIR), |path, segment| {
                path.join(segment)
            })
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Move the temp file into place. Without `overwrite`, a hard link is
    /// used so an existing destination is never replaced.
    async fn publish(
        &self,
        temp_path: &Path,
        blob_path: &Path,
        key: &BlobKey,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        Self::ensure_parent(blob_path).await?;

        if overwrite {
            return Ok(fs::rename(temp_path, blob_path).await?);
        }

        let linked = fs::hard_link(temp_path, blob_path).await;
        let _ = fs::remove_file(temp_path).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobSink for FilesystemBlobSink {
    async fn put(
        &self,
        key: &BlobKey,
        data: &[u8],
        content_type: &str,
        options: PutOptions,
    ) -> Result<(), StorageError> {
        let blob_path = self.blob_path(key);

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = self
            .publish(&temp_path, &blob_path, key, options.overwrite)
            .await
        {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        let meta_path = self.meta_path(key);
        let sidecar = async {
            Self::ensure_parent(&meta_path).await?;
            fs::write(&meta_path, content_type.as_bytes()).await?;
            Ok::<(), StorageError>(())
        }
        .await;

        if let Err(e) = sidecar {
            let _ = fs::remove_file(&blob_path).await;
            return Err(e);
        }

        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<StoredBlob, StorageError> {
        let bytes = match fs::read(self.blob_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = match fs::read_to_string(self.meta_path(key)).await {
            Ok(ct) => Some(ct),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(StoredBlob {
            bytes,
            content_type,
        })
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(key)).await?)
    }

    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError> {
        let deleted = match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        match fs::remove_file(self.meta_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove sidecar for {key}: {e}"),
        }

        Ok(deleted)
    }
}
