use thiserror::Error;

/// Errors that can occur during blob sink operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(String),
    /// A blob already exists at the path and overwriting was not requested.
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
    /// The blob path failed validation.
    #[error("invalid blob path: {0}")]
    InvalidPath(String),
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error reported by a remote object store.
    #[error("storage backend error: {0}")]
    Backend(String),
}
