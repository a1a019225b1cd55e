//! Uplog Core Library
//!
//! This crate provides the data model, error types, configuration and URL
//! formatting shared by every stage of the upload pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod url_template;

// Re-export commonly used types
pub use config::{Config, StorageConfig, WebPConfig};
pub use error::{ErrorKind, UplogError, UplogResult};
pub use models::{MediaType, PipelineResult, TranscodePolicy, UploadDestination};
pub use storage_types::StorageBackend;
pub use url_template::{format_url, UrlTemplate};
