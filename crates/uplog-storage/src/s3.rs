use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;

use crate::store;
use crate::traits::{ObjectInfo, ObjectUpload, Project, Storage, StorageError, StorageResult};
use crate::StorageBackend;

/// S3 storage implementation
///
/// Works against AWS and S3-compatible providers (Storj gateway, MinIO,
/// DigitalOcean Spaces). The access grant has the form
/// `ACCESS_KEY_ID:SECRET_ACCESS_KEY[:SESSION_TOKEN]`.
#[derive(Clone)]
pub struct S3Storage {
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO, "https://gateway.storjshare.io" for Storj)
    pub fn new(region: String, endpoint_url: Option<String>) -> Self {
        S3Storage {
            region,
            endpoint_url,
        }
    }
}

/// Parsed S3 credentials.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct S3Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub(crate) fn parse_access(access: &str) -> StorageResult<S3Credentials> {
    let mut parts = access.splitn(3, ':');
    let access_key_id = parts.next().unwrap_or("").trim();
    let secret_access_key = parts.next().unwrap_or("").trim();
    let session_token = parts
        .next()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if access_key_id.is_empty() || secret_access_key.is_empty() {
        return Err(StorageError::AuthFailed(
            "access grant must be ACCESS_KEY_ID:SECRET_ACCESS_KEY[:SESSION_TOKEN]".to_string(),
        ));
    }

    Ok(S3Credentials {
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        session_token,
    })
}

#[async_trait]
impl Storage for S3Storage {
    async fn open_project(&self, access: &str) -> StorageResult<Box<dyn Project>> {
        let credentials = parse_access(access)?;
        tracing::debug!(
            access_key_id = %credentials.access_key_id,
            region = %self.region,
            endpoint = ?self.endpoint_url,
            "Opened S3 session"
        );
        Ok(Box::new(S3Project {
            credentials,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            stores: Mutex::default(),
        }))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

struct S3Project {
    credentials: S3Credentials,
    region: String,
    endpoint_url: Option<String>,
    /// One client per bucket, built on first use.
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl S3Project {
    fn store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }
        let store = self.build_store(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    fn build_store(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::new()
            .with_region(self.region.clone())
            .with_bucket_name(bucket)
            .with_access_key_id(self.credentials.access_key_id.clone())
            .with_secret_access_key(self.credentials.secret_access_key.clone());

        if let Some(ref token) = self.credentials.session_token {
            builder = builder.with_token(token.clone());
        }

        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder.build().map_err(|e| StorageError::BucketSetupFailed {
            bucket: bucket.to_string(),
            message: e.to_string(),
        })?;
        Ok(Arc::new(store))
    }
}

#[async_trait]
impl Project for S3Project {
    /// Probe the bucket with a delimiter listing.
    ///
    /// object_store has no bucket-creation API, so a missing bucket is
    /// reported instead of created.
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();

        store.list_with_delimiter(None).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 bucket probe failed"
            );
            if store::is_auth_error(&e) {
                StorageError::AuthFailed(e.to_string())
            } else {
                StorageError::BucketSetupFailed {
                    bucket: bucket.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        tracing::debug!(
            bucket = %bucket,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bucket available"
        );
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
