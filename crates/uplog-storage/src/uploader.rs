//! Upload state machine.
//!
//! `Idle → SessionOpen → TransferInProgress → Committed | Aborted`
//!
//! The write handle is owned by a [`TransferGuard`] from the moment it is
//! opened. The guard aborts the pending object on every exit that is not a
//! commit, so a failed transfer never leaves a readable partial object.

use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use uplog_core::{UplogError, UploadDestination};

use crate::keys::{validate_key, ObjectKey};
use crate::traits::{CommitInfo, ObjectUpload, Project, Storage, StorageError, StorageResult};

/// Size of each read from the source.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Upload lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    SessionOpen,
    TransferInProgress,
    Committed,
    Aborted,
}

impl UploadState {
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Idle, SessionOpen)
                | (SessionOpen, TransferInProgress)
                | (TransferInProgress, Committed)
                | (TransferInProgress, Aborted)
        )
    }
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub size_bytes: u64,
    pub e_tag: Option<String>,
    pub state: UploadState,
}

/// Streams a byte source into a storage backend under a given key.
#[derive(Clone)]
pub struct Uploader {
    storage: Arc<dyn Storage>,
}

impl Uploader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Upload everything `source` yields to `destination` at `key`.
    ///
    /// The storage session is closed on every path. On error the returned
    /// kind identifies the failed step: `Auth`, `StorageSetup`, `UploadInit`,
    /// `Transfer` (partial object aborted) or `Commit` (visibility undefined).
    pub async fn upload<R>(
        &self,
        source: &mut R,
        destination: &UploadDestination,
        key: &ObjectKey,
    ) -> Result<UploadReceipt, UplogError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut run = UploadRun::new(&destination.bucket, &key.key);

        let project = self
            .storage
            .open_project(&destination.access_grant)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    backend = %self.storage.backend_type(),
                    "Failed to open storage session"
                );
                UplogError::from(e)
            })?;
        run.advance(UploadState::SessionOpen);

        let result = run.in_session(project.as_ref(), source).await;

        if let Err(e) = project.close().await {
            tracing::warn!(error = %e, bucket = %run.bucket, "Failed to close storage session");
        }

        result
    }
}

/// State of one `Uploader::upload` call.
struct UploadRun<'a> {
    bucket: &'a str,
    key: &'a str,
    state: UploadState,
}

impl<'a> UploadRun<'a> {
    fn new(bucket: &'a str, key: &'a str) -> Self {
        Self {
            bucket,
            key,
            state: UploadState::Idle,
        }
    }

    fn advance(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid upload transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(key = %self.key, from = ?self.state, to = ?next, "Upload state change");
        self.state = next;
    }

    async fn in_session<R>(
        &mut self,
        project: &dyn Project,
        source: &mut R,
    ) -> Result<UploadReceipt, UplogError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        project.ensure_bucket(self.bucket).await?;
        validate_key(self.key)?;

        let upload = project.begin_upload(self.bucket, self.key).await?;
        let mut guard = TransferGuard::new(upload, self.key);
        self.advance(UploadState::TransferInProgress);

        let start = Instant::now();
        let size_bytes = match copy_into(source, &mut guard).await {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %self.key,
                    "Transfer failed, aborting upload"
                );
                guard.abort().await;
                self.advance(UploadState::Aborted);
                return Err(e.into());
            }
        };

        match guard.commit().await {
            Ok(info) => {
                self.advance(UploadState::Committed);
                tracing::info!(
                    bucket = %self.bucket,
                    key = %self.key,
                    size_bytes = size_bytes,
                    e_tag = ?info.e_tag,
                    version = ?info.version,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload committed"
                );
                Ok(UploadReceipt {
                    bucket: self.bucket.to_string(),
                    key: self.key.to_string(),
                    size_bytes,
                    e_tag: info.e_tag,
                    state: self.state,
                })
            }
            Err(e) => {
                self.advance(UploadState::Aborted);
                self.discard_uncertain_object(project).await;
                Err(e.into())
            }
        }
    }

    /// After a failed commit the object may or may not exist. Try to remove
    /// it; the commit error is reported either way.
    async fn discard_uncertain_object(&self, project: &dyn Project) {
        match project.delete_object(self.bucket, self.key).await {
            Ok(()) => tracing::warn!(
                bucket = %self.bucket,
                key = %self.key,
                "Commit failed; removed any object left at key"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                bucket = %self.bucket,
                key = %self.key,
                "Commit failed and cleanup did not succeed; object state unknown"
            ),
        }
    }
}

async fn copy_into<R>(source: &mut R, guard: &mut TransferGuard) -> StorageResult<u64>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut total: u64 = 0;

    loop {
        buf.reserve(READ_CHUNK_SIZE);
        let n = source
            .read_buf(&mut buf)
            .await
            .map_err(|e| StorageError::SourceReadFailed(e.to_string()))?;
        if n == 0 {
            break;
        }
        total += n as u64;
        guard.write(buf.split().freeze()).await?;
    }

    guard.flush().await?;
    Ok(total)
}

/// Owns a pending upload and aborts it unless it is committed.
struct TransferGuard {
    upload: Option<Box<dyn ObjectUpload>>,
    key: String,
}

impl TransferGuard {
    fn new(upload: Box<dyn ObjectUpload>, key: &str) -> Self {
        Self {
            upload: Some(upload),
            key: key.to_string(),
        }
    }

    fn pending(&mut self) -> StorageResult<&mut Box<dyn ObjectUpload>> {
        let key = &self.key;
        self.upload
            .as_mut()
            .ok_or_else(|| StorageError::UploadFailed(format!("upload of {} already finished", key)))
    }

    async fn write(&mut self, chunk: Bytes) -> StorageResult<()> {
        self.pending()?.write(chunk).await
    }

    async fn flush(&mut self) -> StorageResult<()> {
        self.pending()?.flush().await
    }

    /// Finalize the upload. A failed commit also releases the handle.
    async fn commit(mut self) -> StorageResult<CommitInfo> {
        let mut upload = self.upload.take().ok_or_else(|| {
            StorageError::CommitFailed(format!("upload of {} already finished", self.key))
        })?;

        let result = upload.commit().await;
        if result.is_err() {
            if let Err(e) = upload.abort().await {
                tracing::debug!(error = %e, key = %self.key, "Abort after failed commit failed");
            }
        }
        result
    }

    async fn abort(mut self) {
        if let Some(mut upload) = self.upload.take() {
            if let Err(e) = upload.abort().await {
                tracing::warn!(error = %e, key = %self.key, "Failed to abort partial upload");
            }
        }
    }
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        let Some(mut upload) = self.upload.take() else {
            return;
        };

        tracing::warn!(key = %self.key, "Upload dropped before commit, aborting");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let key = std::mem::take(&mut self.key);
                handle.spawn(async move {
                    if let Err(e) = upload.abort().await {
                        tracing::warn!(error = %e, key = %key, "Failed to abort dropped upload");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(key = %self.key, "No runtime available to abort dropped upload");
            }
        }
    }
}
