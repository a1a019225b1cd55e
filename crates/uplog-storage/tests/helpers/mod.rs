//! Scripted storage backend for uploader tests.
//!
//! Records every call in order so tests can check that sessions are closed
//! and partial uploads aborted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use uplog_storage::{
    CommitInfo, ObjectInfo, ObjectUpload, Project, Storage, StorageBackend, StorageError,
    StorageResult,
};

#[derive(Default)]
struct Shared {
    events: Vec<String>,
    objects: HashMap<String, Vec<u8>>,
}

/// Behaviour switches for [`ScriptedStorage`].
#[derive(Clone, Copy, Default)]
pub struct Script {
    pub fail_ensure_bucket: bool,
    pub fail_begin: bool,
    /// Fail the n-th write (1-based).
    pub fail_write_at: Option<usize>,
    pub fail_flush: bool,
    pub fail_commit: bool,
    /// Commit reports failure but the object still lands.
    pub commit_lands_anyway: bool,
    pub fail_delete: bool,
    pub fail_close: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedStorage {
    script: Script,
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedStorage {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            shared: Arc::default(),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.shared.lock().unwrap().events.clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.shared.lock().unwrap().objects.get(key).cloned()
    }

    fn record(shared: &Mutex<Shared>, event: impl Into<String>) {
        shared.lock().unwrap().events.push(event.into());
    }
}

#[async_trait]
impl Storage for ScriptedStorage {
    async fn open_project(&self, _access: &str) -> StorageResult<Box<dyn Project>> {
        Self::record(&self.shared, "open");
        Ok(Box::new(ScriptedProject {
            script: self.script,
            shared: self.shared.clone(),
        }))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

struct ScriptedProject {
    script: Script,
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl Project for ScriptedProject {
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        ScriptedStorage::record(&self.shared, "ensure_bucket");
        if self.script.fail_ensure_bucket {
            return Err(StorageError::BucketSetupFailed {
                bucket: bucket.to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        Ok(())
    }

    async fn begin_upload(&self, _bucket: &str, key: &str) -> StorageResult<Box<dyn ObjectUpload>> {
        ScriptedStorage::record(&self.shared, "begin");
        if self.script.fail_begin {
            return Err(StorageError::UploadInitFailed {
                key: key.to_string(),
                message: "too many pending uploads".to_string(),
            });
        }
        Ok(Box::new(ScriptedUpload {
            script: self.script,
            shared: self.shared.clone(),
            key: key.to_string(),
            data: Vec::new(),
            writes: 0,
        }))
    }

    async fn stat_object(&self, _bucket: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        Ok(self.shared.lock().unwrap().objects.get(key).map(|data| ObjectInfo {
            key: key.to_string(),
            size: data.len() as u64,
        }))
    }

    async fn get_object(&self, _bucket: &str, key: &str) -> StorageResult<Bytes> {
        self.shared
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|data| Bytes::from(data.clone()))
            .ok_or_else(|| StorageError::DownloadFailed(key.to_string()))
    }

    async fn delete_object(&self, _bucket: &str, key: &str) -> StorageResult<()> {
        ScriptedStorage::record(&self.shared, "delete");
        if self.script.fail_delete {
            return Err(StorageError::DeleteFailed("scripted".to_string()));
        }
        self.shared.lock().unwrap().objects.remove(key);
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        ScriptedStorage::record(&self.shared, "close");
        if self.script.fail_close {
            return Err(StorageError::BackendError("scripted".to_string()));
        }
        Ok(())
    }
}

struct ScriptedUpload {
    script: Script,
    shared: Arc<Mutex<Shared>>,
    key: String,
    data: Vec<u8>,
    writes: usize,
}

#[async_trait]
impl ObjectUpload for ScriptedUpload {
    async fn write(&mut self, chunk: Bytes) -> StorageResult<()> {
        self.writes += 1;
        if self.script.fail_write_at == Some(self.writes) {
            ScriptedStorage::record(&self.shared, "write_failed");
            return Err(StorageError::UploadFailed("connection reset".to_string()));
        }
        self.data.extend_from_slice(&chunk);
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        if self.script.fail_flush {
            return Err(StorageError::UploadFailed("flush rejected".to_string()));
        }
        Ok(())
    }

    async fn commit(&mut self) -> StorageResult<CommitInfo> {
        ScriptedStorage::record(&self.shared, "commit");
        if self.script.fail_commit {
            if self.script.commit_lands_anyway {
                let data = std::mem::take(&mut self.data);
                self.shared.lock().unwrap().objects.insert(self.key.clone(), data);
            }
            return Err(StorageError::CommitFailed("gateway timeout".to_string()));
        }
        let data = std::mem::take(&mut self.data);
        self.shared.lock().unwrap().objects.insert(self.key.clone(), data);
        Ok(CommitInfo {
            e_tag: Some("\"etag-1\"".to_string()),
            version: None,
        })
    }

    async fn abort(&mut self) -> StorageResult<()> {
        ScriptedStorage::record(&self.shared, "abort");
        self.data.clear();
        Ok(())
    }
}
