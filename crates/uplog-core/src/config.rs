//! Configuration module
//!
//! The configuration lives in a TOML file (by default
//! `$XDG_CONFIG_HOME/uplog/config.toml`). Keys missing from the file fall back
//! to their defaults, so rewriting a loaded file adds any keys introduced by
//! newer versions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{
    ACCESS_GRANT_ENV, DEFAULT_BUCKET_NAME, DEFAULT_BUCKET_PREFIX, DEFAULT_FORMAT_URL,
    DEFAULT_S3_ENDPOINT, DEFAULT_S3_REGION, DEFAULT_WEBP_MIME_TYPES, DEFAULT_WEBP_QUALITY,
};
use crate::error::{UplogError, UplogResult};
use crate::models::{TranscodePolicy, UploadDestination};
use crate::storage_types::StorageBackend;
use crate::url_template::UrlTemplate;

/// Destination settings. Also accepted under the legacy `[storj]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Opaque credential. For S3 backends: `ACCESS_KEY_ID:SECRET_ACCESS_KEY[:SESSION_TOKEN]`.
    pub access_grant: String,
    pub bucket_name: String,
    pub bucket_prefix: String,
    /// Custom endpoint for S3-compatible providers
    pub endpoint: Option<String>,
    pub region: String,
    /// Root directory for the local backend; each bucket is a subdirectory.
    pub local_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            access_grant: String::new(),
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            endpoint: Some(DEFAULT_S3_ENDPOINT.to_string()),
            region: DEFAULT_S3_REGION.to_string(),
            local_path: None,
        }
    }
}

/// WebP re-encoding settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebPConfig {
    pub enabled: bool,
    pub mime_types: Vec<String>,
    pub quality: i64,
}

impl Default for WebPConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mime_types: DEFAULT_WEBP_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            quality: DEFAULT_WEBP_QUALITY,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template for the printed URL; see [`UrlTemplate`].
    pub format_url: String,
    #[serde(alias = "storj")]
    pub storage: StorageConfig,
    pub webp: WebPConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format_url: DEFAULT_FORMAT_URL.to_string(),
            storage: StorageConfig::default(),
            webp: WebPConfig::default(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/uplog/config.toml`, falling back to `$HOME/.config`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("uplog")
            .join("config.toml")
    }

    pub fn load(path: impl AsRef<Path>) -> UplogResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            UplogError::Config(format!("could not load config {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            UplogError::Config(format!("could not parse config {}: {}", path.display(), e))
        })?;

        info!(
            config_path = %path.display(),
            backend = %config.storage.backend,
            bucket = %config.storage.bucket_name,
            webp_enabled = config.webp.enabled,
            "Loaded config"
        );
        Ok(config)
    }

    /// Write the config as TOML, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> UplogResult<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                UplogError::Config(format!(
                    "could not create config directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| UplogError::Config(format!("could not encode config: {}", e)))?;
        fs::write(path, content).map_err(|e| {
            UplogError::Config(format!("could not write config {}: {}", path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o660)).map_err(|e| {
                UplogError::Config(format!(
                    "could not set permissions on {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }

        debug!(config_path = %path.display(), "Config written");
        Ok(())
    }

    /// Replace the access grant with `UPLOG_ACCESS_GRANT` when it is set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_access_grant_override(std::env::var(ACCESS_GRANT_ENV).ok());
    }

    fn apply_access_grant_override(&mut self, grant: Option<String>) {
        if let Some(grant) = grant.filter(|g| !g.is_empty()) {
            debug!(env = ACCESS_GRANT_ENV, "Access grant taken from environment");
            self.storage.access_grant = grant;
        }
    }

    /// Check settings that would otherwise fail late in the pipeline.
    ///
    /// The WebP quality range is not checked here; the transcoder rejects it
    /// when an image is actually re-encoded.
    pub fn validate(&self) -> UplogResult<()> {
        if self.storage.bucket_name.trim().is_empty() {
            return Err(UplogError::Config("bucket_name must not be empty".to_string()));
        }
        if self.storage.backend == StorageBackend::Local && self.storage.local_path.is_none() {
            return Err(UplogError::Config(
                "local_path is required for the local storage backend".to_string(),
            ));
        }
        validate_prefix(&self.storage.bucket_prefix)?;
        Ok(())
    }

    pub fn transcode_policy(&self) -> TranscodePolicy {
        TranscodePolicy {
            enabled: self.webp.enabled,
            eligible_mime_types: self.webp.mime_types.clone(),
            quality: self.webp.quality,
        }
    }

    pub fn destination(&self) -> UploadDestination {
        UploadDestination {
            access_grant: self.storage.access_grant.clone(),
            bucket: self.storage.bucket_name.clone(),
            prefix: self.storage.bucket_prefix.clone(),
        }
    }

    pub fn url_template(&self) -> UrlTemplate {
        UrlTemplate::from(self.format_url.clone())
    }
}

/// A prefix must form valid key segments once its trailing `/` is added.
fn validate_prefix(prefix: &str) -> UplogResult<()> {
    if prefix.is_empty() {
        return Ok(());
    }
    let body = prefix.strip_suffix('/').unwrap_or(prefix);
    if prefix.starts_with('/')
        || body
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(UplogError::Config(format!(
            "bucket_prefix {:?} must be relative with no empty, '.' or '..' segments",
            prefix
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.bucket_name, "uplog");
        assert_eq!(config.storage.bucket_prefix, "folder");
        assert!(config.webp.enabled);
        assert_eq!(config.webp.quality, 75);
        assert_eq!(
            config.webp.mime_types,
            vec!["image/jpeg", "image/png", "image/gif"]
        );
        assert_eq!(
            config.format_url,
            "https://example.com/{{bucket}}/{{prefix}}/{{filename}}"
        );
    }

    #[test]
    fn test_load_legacy_storj_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
format_url = "https://link.storjshare.io/raw/{{bucket}}/{{prefix}}{{filename}}"

[storj]
access_grant = "1abc"
bucket_name = "screenshots"
bucket_prefix = "2024"

[webp]
enabled = false
mime_types = ["image/png"]
quality = 90
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.access_grant, "1abc");
        assert_eq!(config.storage.bucket_name, "screenshots");
        assert_eq!(config.storage.bucket_prefix, "2024");
        // Keys absent from the file keep their defaults
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.region, "us-east-1");
        assert!(!config.webp.enabled);
        assert_eq!(config.webp.quality, 90);
    }

    #[test]
    fn test_save_creates_directory_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("uplog").join("config.toml");

        let mut config = Config::default();
        config.storage.backend = StorageBackend::Local;
        config.storage.local_path = Some(PathBuf::from("/srv/uplog"));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "format_url = [").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_access_grant_override() {
        let mut config = Config::default();
        config.apply_access_grant_override(Some("from-env".to_string()));
        assert_eq!(config.storage.access_grant, "from-env");

        config.apply_access_grant_override(Some(String::new()));
        assert_eq!(config.storage.access_grant, "from-env");

        config.apply_access_grant_override(None);
        assert_eq!(config.storage.access_grant, "from-env");
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.storage.bucket_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.backend = StorageBackend::Local;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bucket_prefix() {
        for prefix in ["", "folder", "folder/", "a/b", "a/b/"] {
            let mut config = Config::default();
            config.storage.bucket_prefix = prefix.to_string();
            assert!(config.validate().is_ok(), "{:?} should be accepted", prefix);
        }
        for prefix in ["/folder", "/", "a//b", "folder//", "a/../b", "./a", ".."] {
            let mut config = Config::default();
            config.storage.bucket_prefix = prefix.to_string();
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Config, "{:?}", prefix);
        }
    }

    #[test]
    fn test_validate_ignores_quality() {
        let mut config = Config::default();
        config.webp.quality = 250;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_views() {
        let config = Config::default();
        let policy = config.transcode_policy();
        assert!(policy.enabled);
        assert_eq!(policy.quality, 75);

        let dest = config.destination();
        assert_eq!(dest.bucket, "uplog");
        assert_eq!(dest.prefix, "folder");

        assert_eq!(config.url_template().as_str(), config.format_url);
    }
}
