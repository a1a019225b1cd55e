use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use tokio::fs;

use crate::store;
use crate::traits::{ObjectInfo, ObjectUpload, Project, Storage, StorageError, StorageResult};
use crate::StorageBackend;

/// Local filesystem storage implementation
///
/// Each bucket is a directory under `base_path`. Uploads are staged next to
/// their destination and renamed into place on commit, so an aborted upload
/// never appears at its key.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for buckets (e.g., "/var/lib/uplog")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    /// The local backend has no notion of credentials; any value is accepted.
    async fn open_project(&self, _access: &str) -> StorageResult<Box<dyn Project>> {
        Ok(Box::new(LocalProject {
            base_path: self.base_path.clone(),
        }))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

struct LocalProject {
    base_path: PathBuf,
}

impl LocalProject {
    /// Convert a bucket name to its directory, refusing names that would
    /// escape the base directory.
    fn bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty()
            || bucket.contains('/')
            || bucket.contains('\\')
            || bucket == "."
            || bucket == ".."
        {
            return Err(StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: "invalid bucket name".to_string(),
            });
        }
        Ok(self.base_path.join(bucket))
    }

    fn store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let path = self.bucket_path(bucket)?;
        let store = LocalFileSystem::new_with_prefix(&path).map_err(|e| {
            StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Arc::new(store))
    }
}

#[async_trait]
impl Project for LocalProject {
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        let path = self.bucket_path(bucket)?;
        fs::create_dir_all(&path).await.map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path.display(),
                bucket = %bucket,
                "Failed to create bucket directory"
            );
            StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    async fn begin_upload(&self, bucket: &str, key: &str) -> StorageResult<Box<dyn ObjectUpload>> {
        let store = self.store(bucket)?;
        store::begin_multipart(&store, key).await
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        let store = self.store(bucket)?;
        store::stat(&store, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let store = self.store(bucket)?;
        store::get(&store, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let store = self.store(bucket)?;
        store::delete(&store, key).await
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
