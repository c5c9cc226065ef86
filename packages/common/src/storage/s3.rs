use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::error::StorageError;
use super::key::BlobKey;
use super::traits::{BlobSink, PutOptions, StoredBlob};
use crate::config::StorageConfig;

/// Blob sink backed by an S3-compatible bucket.
pub struct S3BlobSink {
    bucket: Box<Bucket>,
}

impl S3BlobSink {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(backend)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

fn backend(err: s3::error::S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn check_status(key: &BlobKey, op: &str, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(key.to_string())),
        other => Err(StorageError::Backend(format!(
            "{op} {key} returned HTTP {other}"
        ))),
    }
}

#[async_trait]
impl BlobSink for S3BlobSink {
    async fn put(
        &self,
        key: &BlobKey,
        data: &[u8],
        content_type: &str,
        options: PutOptions,
    ) -> Result<(), StorageError> {
        // S3 has no create-only PUT, so the existence guard is a separate HEAD.
        if !options.overwrite && self.exists(key).await? {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        let response = self
            .bucket
            .put_object_with_content_type(key.as_str(), data, content_type)
            .await
            .map_err(backend)?;
        check_status(key, "PUT", response.status_code())
    }

    async fn get(&self, key: &BlobKey) -> Result<StoredBlob, StorageError> {
        let response = self
            .bucket
            .get_object(key.as_str())
            .await
            .map_err(backend)?;
        check_status(key, "GET", response.status_code())?;

        let content_type = response.headers().get("content-type").cloned();
        Ok(StoredBlob {
            bytes: response.bytes().to_vec(),
            content_type,
        })
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError> {
        let (_, status) = self
            .bucket
            .head_object(key.as_str())
            .await
            .map_err(backend)?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            other => Err(StorageError::Backend(format!(
                "HEAD {key} returned HTTP {other}"
            ))),
        }
    }

    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError> {
        if !self.exists(key).await? {
            return Ok(false);
        }
        let response = self
            .bucket
            .delete_object(key.as_str())
            .await
            .map_err(backend)?;
        check_status(key, "DELETE", response.status_code())?;
        Ok(true)
    }
}
