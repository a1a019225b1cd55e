//! Shared key generation for storage backends.
//!
//! Key format: `{prefix}{uuid}.{extension}` where a non-empty prefix always
//! ends with `/`.

use uplog_core::MediaType;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// A key prefix normalized once per run.
///
/// An empty prefix stays empty; anything else is guaranteed to end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new(raw: &str) -> Self {
        if raw.is_empty() || raw.ends_with('/') {
            KeyPrefix(raw.to_string())
        } else {
            KeyPrefix(format!("{}/", raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generated storage location for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    /// Full object key inside the bucket (`prefix + filename`).
    pub key: String,
    /// Display filename (`{uuid}.{extension}`).
    pub filename: String,
}

/// Generate a fresh key for `media_type` under `prefix`.
///
/// Uniqueness comes from a random v4 UUID, so concurrent callers need no
/// coordination.
pub fn generate_key(prefix: &KeyPrefix, media_type: &MediaType) -> ObjectKey {
    let filename = format!("{}.{}", Uuid::new_v4(), media_type.extension());
    ObjectKey {
        key: format!("{}{}", prefix.as_str(), filename),
        filename,
    }
}

/// Reject keys that would not address a single object.
///
/// Keys must be non-empty, must not start with `/`, and must not contain empty,
/// `.` or `..` segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!("{} starts with '/'", key)));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "{} contains an empty or relative segment",
            key
        )));
    }
    Ok(())
}
