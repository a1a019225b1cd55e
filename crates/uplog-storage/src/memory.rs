use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::ObjectStore;

use crate::store;
use crate::traits::{ObjectInfo, ObjectUpload, Project, Storage, StorageError, StorageResult};
use crate::StorageBackend;

type Buckets = Arc<Mutex<HashMap<String, Arc<dyn ObjectStore>>>>;

/// In-memory storage implementation
///
/// Buckets live for as long as the `MemoryStorage` (and its clones), so
/// objects committed in one session are readable from the next.
#[derive(Clone)]
pub struct MemoryStorage {
    buckets: Buckets,
    required_access: Option<String>,
    create_buckets: bool,
}

impl MemoryStorage {
    /// Storage that accepts any credential and creates buckets on demand.
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            required_access: None,
            create_buckets: true,
        }
    }

    /// Only accept `access` as credential.
    pub fn with_access(mut self, access: impl Into<String>) -> Self {
        self.required_access = Some(access.into());
        self
    }

    /// Refuse to create buckets that do not exist yet.
    pub fn without_bucket_creation(mut self) -> Self {
        self.create_buckets = false;
        self
    }

    /// Pre-create a bucket.
    pub fn with_bucket(self, bucket: &str) -> Self {
        lock(&self.buckets).insert(bucket.to_string(), Arc::new(InMemory::new()));
        self
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        lock(&self.buckets).contains_key(bucket)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(
    buckets: &Buckets,
) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn ObjectStore>>> {
    buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn open_project(&self, access: &str) -> StorageResult<Box<dyn Project>> {
        if let Some(required) = &self.required_access {
            if required != access {
                return Err(StorageError::AuthFailed(
                    "access grant rejected by memory storage".to_string(),
                ));
            }
        }
        Ok(Box::new(MemoryProject {
            buckets: self.buckets.clone(),
            create_buckets: self.create_buckets,
        }))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

struct MemoryProject {
    buckets: Buckets,
    create_buckets: bool,
}

impl MemoryProject {
    fn store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        lock(&self.buckets)
            .get(bucket)
            .cloned()
            .ok_or_else(|| StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: "bucket does not exist".to_string(),
            })
    }
}

#[async_trait]
impl Project for MemoryProject {
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        if bucket.is_empty() {
            return Err(StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: "bucket name is empty".to_string(),
            });
        }

        let mut buckets = lock(&self.buckets);
        if buckets.contains_key(bucket) {
            return Ok(());
        }
        if !self.create_buckets {
            return Err(StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: "bucket does not exist and creation is not permitted".to_string(),
            });
        }
        buckets.insert(bucket.to_string(), Arc::new(InMemory::new()));
        tracing::debug!(bucket = %bucket, "Memory bucket created");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_wrong_access() {
        let storage = MemoryStorage::new().with_access("secret");
        assert!(matches!(
            storage.open_project("wrong").await,
            Err(StorageError::AuthFailed(_))
        ));
        assert!(storage.open_project("secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_bucket_creates_on_demand() {
        let storage = MemoryStorage::new();
        let project = storage.open_project("").await.unwrap();
        project.ensure_bucket("uplog").await.unwrap();
        assert!(storage.has_bucket("uplog"));
        // Second call is a no-op
        project.ensure_bucket("uplog").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_bucket_without_creation() {
        let storage = MemoryStorage::new()
            .without_bucket_creation()
            .with_bucket("existing");
        let project = storage.open_project("").await.unwrap();
        assert!(project.ensure_bucket("existing").await.is_ok());
        assert!(matches!(
            project.ensure_bucket("missing").await,
            Err(StorageError::BucketSetupFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_object_invisible_until_commit() {
        let storage = MemoryStorage::new().with_bucket("b");
        let project = storage.open_project("").await.unwrap();

        let mut upload = project.begin_upload("b", "p/file.bin").await.unwrap();
        upload.write(Bytes::from_static(b"hello")).await.unwrap();
        upload.flush().await.unwrap();
        assert_eq!(project.stat_object("b", "p/file.bin").await.unwrap(), None);

        upload.commit().await.unwrap();
        let info = project.stat_object("b", "p/file.bin").await.unwrap().unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(
            project.get_object("b", "p/file.bin").await.unwrap(),
            Bytes::from_static(b"hello")
        );
    }

    #[tokio::test]
    async fn test_aborted_upload_leaves_nothing() {
        let storage = MemoryStorage::new().with_bucket("b");
        let project = storage.open_project("").await.unwrap();

        let mut upload = project.begin_upload("b", "gone.bin").await.unwrap();
        upload.write(Bytes::from_static(b"partial")).await.unwrap();
        upload.flush().await.unwrap();
        upload.abort().await.unwrap();

        assert_eq!(project.stat_object("b", "gone.bin").await.unwrap(), None);
    }
}
