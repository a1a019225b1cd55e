use crate::{LocalStorage, MemoryStorage, S3Storage};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use uplog_core::Config;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = &config.storage;

    match storage.backend {
        StorageBackend::S3 => {
            let region = storage.region.trim();
            if region.is_empty() {
                return Err(StorageError::ConfigError(
                    "region not configured for the s3 backend".to_string(),
                ));
            }
            let endpoint = storage
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from);

            tracing::debug!(region = %region, endpoint = ?endpoint, "Using S3 storage backend");
            Ok(Arc::new(S3Storage::new(region.to_string(), endpoint)))
        }

        StorageBackend::Local => {
            let base_path = storage.local_path.clone().ok_or_else(|| {
                StorageError::ConfigError(
                    "local_path not configured for the local backend".to_string(),
                )
            })?;

            tracing::debug!(path = %base_path.display(), "Using local storage backend");
            let storage = LocalStorage::new(base_path).await?;
            Ok(Arc::new(storage))
        }

        // Nothing survives the process; useful for dry runs.
        StorageBackend::Memory => {
            tracing::debug!("Using in-memory storage backend");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
