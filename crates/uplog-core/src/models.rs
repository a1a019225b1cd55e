//! Values created at the start of a pipeline run and discarded at its end.

use std::fmt;

use crate::error::UplogError;

/// Detected media classification: MIME string plus canonical file extension.
///
/// The extension is stored without a leading dot and is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    mime: String,
    extension: String,
}

impl MediaType {
    pub fn new(mime: impl Into<String>, extension: impl Into<String>) -> Result<Self, UplogError> {
        let mime = mime.into();
        let extension = extension.into().trim_start_matches('.').to_string();
        if mime.trim().is_empty() {
            return Err(UplogError::Detection("empty MIME type".to_string()));
        }
        if extension.is_empty() {
            return Err(UplogError::Detection(format!(
                "no file extension known for {}",
                mime
            )));
        }
        Ok(Self { mime, extension })
    }

    /// Full MIME string, including any parameters (e.g. `text/plain; charset=utf-8`).
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// MIME type without parameters, lowercased.
    pub fn essence(&self) -> String {
        mime_essence(&self.mime)
    }

    /// Whether this type matches `candidate`, ignoring parameters and ASCII case.
    pub fn is(&self, candidate: &str) -> bool {
        self.essence() == mime_essence(candidate)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (.{})", self.mime, self.extension)
    }
}

fn mime_essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Re-encoding policy, read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodePolicy {
    pub enabled: bool,
    /// Allow-list of MIME types that are re-encoded. Anything else passes through.
    pub eligible_mime_types: Vec<String>,
    /// Lossy quality, 0-100. Out-of-range values are rejected, never clamped.
    pub quality: i64,
}

impl TranscodePolicy {
    pub fn is_eligible(&self, media_type: &MediaType) -> bool {
        self.eligible_mime_types
            .iter()
            .any(|candidate| media_type.is(candidate))
    }
}

/// Where the object goes.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadDestination {
    /// Opaque credential handed to the storage backend.
    pub access_grant: String,
    pub bucket: String,
    /// Raw key prefix as configured; normalized by the key generator.
    pub prefix: String,
}

impl fmt::Debug for UploadDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadDestination")
            .field("access_grant", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Outcome of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub media_type: MediaType,
    pub key: String,
    pub filename: String,
    pub url: String,
    pub size_bytes: u64,
}
