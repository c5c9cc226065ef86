use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use snapvault_common::storage::{BlobKey, StorageError};

/// Millisecond timestamps that never repeat within one process, so two
/// uploads for the same entity in the same millisecond still get distinct
/// paths. Across processes the sink's no-overwrite guard is the backstop.
#[derive(Debug, Default)]
pub struct MonotonicMillis {
    last: AtomicI64,
}

impl MonotonicMillis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// `{caller_id}/{owner_id}/{millis}.{ext}`. Nothing from the source URL or
/// any remote filename ends up in the path.
pub fn screenshot_key(
    caller_id: &str,
    owner_id: &str,
    millis: i64,
    extension: &str,
) -> Result<BlobKey, StorageError> {
    BlobKey::new(format!("{caller_id}/{owner_id}/{millis}.{extension}"))
}

/// An id is usable as exactly one path segment.
pub fn is_valid_segment(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && !id.starts_with('.')
        && !id.contains(&['/', '\\'][..])
        && !id.chars().any(|c| c.is_control() || c.is_whitespace())
}
