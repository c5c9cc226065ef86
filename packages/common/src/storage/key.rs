use std::fmt;

use super::error::StorageError;

/// A validated, relative, slash-separated blob path such as
/// `user-1/entity-9/1718000000000.png`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    pub fn new(path: impl Into<String>) -> Result<Self, StorageError> {
        let path = path.into();
        validate_blob_key(&path)?;
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject paths that could escape the sink root or collide with sidecar data.
pub fn validate_blob_key(path: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| Err(StorageError::InvalidPath(format!("{path:?}: {reason}")));

    if path.is_empty() {
        return invalid("empty path");
    }
    if path.len() > 1024 {
        return invalid("path too long");
    }
    if path.starts_with('/') {
        return invalid("absolute paths are not allowed");
    }
    if path.contains('\\') {
        return invalid("backslashes are not allowed");
    }
    if path.chars().any(|c| c.is_control()) {
        return invalid("control characters are not allowed");
    }
    for segment in path.split('/') {
        match segment {
            "" => return invalid("empty segment"),
            "." | ".." => return invalid("relative segments are not allowed"),
            s if s.starts_with('.') => return invalid("hidden segments are not allowed"),
            _ => {}
        }
    }
    Ok(())
}
