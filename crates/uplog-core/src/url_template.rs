//! Public URL synthesis from a configured template.
//!
//! Substitution is literal: values are neither escaped nor URL-encoded and
//! repeated slashes are kept. Callers must supply values that are safe in a
//! URL and a template that accounts for the prefix's trailing separator.

use crate::constants::{BUCKET_PLACEHOLDER, FILENAME_PLACEHOLDER, PREFIX_PLACEHOLDER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn format(&self, bucket: &str, prefix: &str, filename: &str) -> String {
        format_url(&self.0, bucket, prefix, filename)
    }
}

impl From<String> for UrlTemplate {
    fn from(template: String) -> Self {
        Self(template)
    }
}

/// Replace every `{{filename}}`, `{{prefix}}` and `{{bucket}}` in `template`.
/// Anything else, including unknown placeholders, is copied verbatim.
pub fn format_url(template: &str, bucket: &str, prefix: &str, filename: &str) -> String {
    template
        .replace(FILENAME_PLACEHOLDER, filename)
        .replace(PREFIX_PLACEHOLDER, prefix)
        .replace(BUCKET_PLACEHOLDER, bucket)
}
