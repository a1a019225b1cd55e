use std::fmt::{Display, Formatter, Result as FmtResult};

/// Storage backend types
///
/// Defined in core because the configuration file selects one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Any S3-compatible service (AWS, Storj gateway, MinIO, ...)
    #[default]
    S3,
    /// Directory tree on the local filesystem, one directory per bucket
    Local,
    /// Process-local store; contents vanish on exit
    Memory,
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}
