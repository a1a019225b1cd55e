//! Error types module
//!
//! Every pipeline stage reports failures through [`UplogError`]. There is one
//! variant per failure class so callers can tell which stage failed without
//! inspecting messages. Stage-local error types (storage, detection,
//! transcoding) convert into the matching variant.

/// Failure class of an [`UplogError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Detection,
    Transcode,
    Auth,
    StorageSetup,
    UploadInit,
    Transfer,
    Commit,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum UplogError {
    /// Input is empty, unreadable, or could not be classified.
    #[error("Detection error: {0}")]
    Detection(String),

    /// Decoding an eligible image failed, or the quality setting is invalid.
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// The storage credential was rejected or is malformed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The destination bucket is missing and could not be created.
    #[error("Storage setup error: {0}")]
    StorageSetup(String),

    /// The write handle for the object key could not be opened.
    #[error("Upload init error: {0}")]
    UploadInit(String),

    /// Reading the source or writing to the destination failed mid-copy.
    /// The partial object has been aborted.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Finalizing the object failed after all bytes were sent. The object's
    /// visibility at the destination is undefined.
    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type UplogResult<T> = Result<T, UplogError>;

impl UplogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UplogError::Detection(_) => ErrorKind::Detection,
            UplogError::Transcode(_) => ErrorKind::Transcode,
            UplogError::Auth(_) => ErrorKind::Auth,
            UplogError::StorageSetup(_) => ErrorKind::StorageSetup,
            UplogError::UploadInit(_) => ErrorKind::UploadInit,
            UplogError::Transfer(_) => ErrorKind::Transfer,
            UplogError::Commit(_) => ErrorKind::Commit,
            UplogError::Config(_) => ErrorKind::Config,
        }
    }

    /// Machine-readable error code (e.g., "TRANSFER_ERROR")
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Detection => "DETECTION_ERROR",
            ErrorKind::Transcode => "TRANSCODE_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::StorageSetup => "STORAGE_SETUP_ERROR",
            ErrorKind::UploadInit => "UPLOAD_INIT_ERROR",
            ErrorKind::Transfer => "TRANSFER_ERROR",
            ErrorKind::Commit => "COMMIT_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }

    /// Whether the destination may hold an object in an unknown state.
    ///
    /// Only a commit failure leaves this ambiguity; every other failure
    /// happens before the write handle exists or is followed by an abort.
    pub fn destination_state_unknown(&self) -> bool {
        matches!(self, UplogError::Commit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_code_match() {
        let cases = [
            (UplogError::Detection("x".into()), ErrorKind::Detection, "DETECTION_ERROR"),
            (UplogError::Transcode("x".into()), ErrorKind::Transcode, "TRANSCODE_ERROR"),
            (UplogError::Auth("x".into()), ErrorKind::Auth, "AUTH_ERROR"),
            (
                UplogError::StorageSetup("x".into()),
                ErrorKind::StorageSetup,
                "STORAGE_SETUP_ERROR",
            ),
            (UplogError::UploadInit("x".into()), ErrorKind::UploadInit, "UPLOAD_INIT_ERROR"),
            (UplogError::Transfer("x".into()), ErrorKind::Transfer, "TRANSFER_ERROR"),
            (UplogError::Commit("x".into()), ErrorKind::Commit, "COMMIT_ERROR"),
            (UplogError::Config("x".into()), ErrorKind::Config, "CONFIG_ERROR"),
        ];

        for (err, kind, code) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn test_only_commit_leaves_destination_unknown() {
        assert!(UplogError::Commit("finalize failed".into()).destination_state_unknown());
        assert!(!UplogError::Transfer("broken pipe".into()).destination_state_unknown());
    }

    #[test]
    fn test_display_includes_message() {
        let err = UplogError::StorageSetup("bucket denied".to_string());
        assert_eq!(err.to_string(), "Storage setup error: bucket denied");
    }
}
