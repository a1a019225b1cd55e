//! Uplog Storage Library
//!
//! This crate provides the storage session abstraction used by the uploader
//! and its implementations for S3-compatible services, the local filesystem
//! and an in-memory store.
//!
//! # Session model
//!
//! A [`Storage`] authenticates a credential and yields a [`Project`]
//! (one session). A project ensures buckets exist and opens
//! [`ObjectUpload`] write handles, which are either committed or aborted.
//! The [`Uploader`] drives that sequence and guarantees that a failed
//! transfer never leaves a committed partial object behind.
//!
//! # Key format
//!
//! Object keys are `{prefix}/{uuid}.{extension}`; key generation is
//! centralized in the `keys` module.

pub mod factory;
pub mod keys;
pub mod local;
pub mod memory;
pub mod s3;
mod store;
pub mod traits;
pub mod uploader;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{generate_key, KeyPrefix, ObjectKey};
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use s3::S3Storage;
pub use traits::{
    CommitInfo, ObjectInfo, ObjectUpload, Project, Storage, StorageError, StorageResult,
};
pub use uplog_core::StorageBackend;
pub use uploader::{UploadReceipt, UploadState, Uploader};
