//! Storage abstraction traits
//!
//! The uploader only talks to storage through these three narrow traits, so
//! backends can be swapped (or faked in tests) without touching the upload
//! state machine.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uplog_core::{StorageBackend, UplogError};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Bucket setup failed for {bucket}: {message}")]
    BucketSetupFailed { bucket: String, message: String },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Could not initiate upload of {key}: {message}")]
    UploadInitFailed { key: String, message: String },

    #[error("Failed to read from source: {0}")]
    SourceReadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for UplogError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::AuthFailed(_) => UplogError::Auth(message),
            StorageError::BucketSetupFailed { .. } => UplogError::StorageSetup(message),
            StorageError::InvalidKey(_) | StorageError::UploadInitFailed { .. } => {
                UplogError::UploadInit(message)
            }
            StorageError::SourceReadFailed(_) | StorageError::UploadFailed(_) => {
                UplogError::Transfer(message)
            }
            StorageError::CommitFailed(_) => UplogError::Commit(message),
            StorageError::ConfigError(_) => UplogError::Config(message),
            // Not produced on the upload path; reads, deletes and probes
            // are follow-up operations against an already set-up bucket.
            StorageError::DownloadFailed(_)
            | StorageError::DeleteFailed(_)
            | StorageError::BackendError(_) => UplogError::StorageSetup(message),
        }
    }
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// What the backend reported when an upload was finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    pub e_tag: Option<String>,
    pub version: Option<String>,
}

/// Entry point of a backend: turns a credential into a session.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Authenticate with the opaque `access` credential and open a session.
    ///
    /// Fails with [`StorageError::AuthFailed`] when the credential is
    /// malformed or rejected.
    async fn open_project(&self, access: &str) -> StorageResult<Box<dyn Project>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// One authenticated session. Must be closed by the caller on every path.
#[async_trait]
pub trait Project: Send + Sync {
    /// Make sure `bucket` exists, creating it if the backend allows.
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Open a write handle bound to `key`. Nothing is visible at `key` until
    /// the handle is committed.
    async fn begin_upload(&self, bucket: &str, key: &str) -> StorageResult<Box<dyn ObjectUpload>>;

    /// Size of the object at `key`, or `None` if nothing readable is there.
    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectInfo>>;

    /// Read a committed object in full.
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Release the session's resources.
    async fn close(&self) -> StorageResult<()>;
}

/// Write handle for a single object.
#[async_trait]
pub trait ObjectUpload: Send {
    /// Append bytes to the pending object. Implementations may buffer.
    async fn write(&mut self, chunk: Bytes) -> StorageResult<()>;

    /// Push any buffered bytes to the backend. Called once after the last
    /// `write`; errors here are transfer errors, not commit errors.
    async fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// Finalize the object so it becomes durably readable.
    async fn commit(&mut self) -> StorageResult<CommitInfo>;

    /// Discard everything written so far.
    async fn abort(&mut self) -> StorageResult<()>;
}
