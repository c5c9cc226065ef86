use std::path::PathBuf;

use serde::Deserialize;

/// Which blob sink implementation backs attachment storage.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// Blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend. Default: "./data/screenshots".
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Bucket name for the S3 backend. Default: "email-screenshots".
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use path-style bucket addressing. Default: true.
    #[serde(default = "default_path_style")]
    pub path_style: bool,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/screenshots")
}
fn default_bucket() -> String {
    "email-screenshots".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_path_style() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            path_style: default_path_style(),
        }
    }
}
