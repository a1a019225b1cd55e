//! object_store plumbing shared by every backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{MultipartUpload, ObjectStore, ObjectStoreExt, PutPayload};

use crate::traits::{CommitInfo, ObjectInfo, ObjectUpload, StorageError, StorageResult};

/// Parts are sent once this many bytes are buffered. S3 rejects non-final
/// parts smaller than 5 MiB.
pub(crate) const PART_SIZE: usize = 5 * 1024 * 1024;

pub(crate) fn object_path(key: &str) -> StorageResult<Path> {
    Path::parse(key).map_err(|e| StorageError::InvalidKey(format!("{}: {}", key, e)))
}

pub(crate) fn is_auth_error(err: &ObjectStoreError) -> bool {
    matches!(
        err,
        ObjectStoreError::Unauthenticated { .. } | ObjectStoreError::PermissionDenied { .. }
    )
}

pub(crate) async fn begin_multipart(
    store: &Arc<dyn ObjectStore>,
    key: &str,
) -> StorageResult<Box<dyn ObjectUpload>> {
    let location = object_path(key)?;
    let upload = store.put_multipart(&location).await.map_err(|e| {
        tracing::error!(error = %e, key = %key, "Failed to initiate multipart upload");
        if is_auth_error(&e) {
            StorageError::AuthFailed(e.to_string())
        } else {
            StorageError::UploadInitFailed {
                key: key.to_string(),
                message: e.to_string(),
            }
        }
    })?;

    Ok(Box::new(MultipartObjectUpload {
        upload,
        key: key.to_string(),
        buffer: BytesMut::new(),
        parts: 0,
    }))
}

pub(crate) async fn stat(
    store: &Arc<dyn ObjectStore>,
    key: &str,
) -> StorageResult<Option<ObjectInfo>> {
    let location = object_path(key)?;
    match store.head(&location).await {
        Ok(meta) => Ok(Some(ObjectInfo {
            key: key.to_string(),
            size: meta.size as u64,
        })),
        Err(ObjectStoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(StorageError::BackendError(e.to_string())),
    }
}

pub(crate) async fn get(store: &Arc<dyn ObjectStore>, key: &str) -> StorageResult<Bytes> {
    let location = object_path(key)?;
    let result = store
        .get(&location)
        .await
        .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))?;
    result
        .bytes()
        .await
        .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))
}

pub(crate) async fn delete(store: &Arc<dyn ObjectStore>, key: &str) -> StorageResult<()> {
    let location = object_path(key)?;
    store
        .delete(&location)
        .await
        .map_err(|e| StorageError::DeleteFailed(format!("{}: {}", key, e)))
}

/// Write handle over an object_store multipart upload.
///
/// Nothing becomes visible at the key until `complete` succeeds, so aborting
/// (or never completing) leaves no readable object behind.
struct MultipartObjectUpload {
    upload: Box<dyn MultipartUpload>,
    key: String,
    buffer: BytesMut,
    parts: usize,
}

impl MultipartObjectUpload {
    async fn send_part(&mut self) -> StorageResult<()> {
        let data = self.buffer.split().freeze();
        let size = data.len();
        self.upload
            .put_part(PutPayload::from(data))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %self.key,
                    part_number = self.parts + 1,
                    size_bytes = size,
                    "Failed to upload part"
                );
                StorageError::UploadFailed(e.to_string())
            })?;
        self.parts += 1;
        Ok(())
    }
}

#[async_trait]
impl ObjectUpload for MultipartObjectUpload {
    async fn write(&mut self, chunk: Bytes) -> StorageResult<()> {
        self.buffer.extend_from_slice(&chunk);
        if self.buffer.len() >= PART_SIZE {
            self.send_part().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        // A multipart upload needs at least one part, even for empty objects.
        if !self.buffer.is_empty() || self.parts == 0 {
            self.send_part().await?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> StorageResult<CommitInfo> {
        let result = self.upload.complete().await.map_err(|e| {
            tracing::error!(
                error = %e,
                key = %self.key,
                parts = self.parts,
                "Failed to complete multipart upload"
            );
            StorageError::CommitFailed(e.to_string())
        })?;
        Ok(CommitInfo {
            e_tag: result.e_tag,
            version: result.version,
        })
    }

    async fn abort(&mut self) -> StorageResult<()> {
        self.upload
            .abort()
            .await
            .map_err(|e| StorageError::BackendError(format!("abort of {}: {}", self.key, e)))
    }
}
