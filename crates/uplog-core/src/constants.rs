//! Application-wide constants.

/// Placeholder replaced by the bucket name in URL templates.
pub const BUCKET_PLACEHOLDER: &str = "{{bucket}}";

/// Placeholder replaced by the normalized key prefix in URL templates.
pub const PREFIX_PLACEHOLDER: &str = "{{prefix}}";

/// Placeholder replaced by the generated object filename in URL templates.
pub const FILENAME_PLACEHOLDER: &str = "{{filename}}";

pub const DEFAULT_FORMAT_URL: &str = "https://example.com/{{bucket}}/{{prefix}}/{{filename}}";
pub const DEFAULT_BUCKET_NAME: &str = "uplog";
pub const DEFAULT_BUCKET_PREFIX: &str = "folder";
pub const DEFAULT_WEBP_QUALITY: i64 = 75;
pub const DEFAULT_WEBP_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// S3-compatible gateway used when no endpoint is configured.
pub const DEFAULT_S3_ENDPOINT: &str = "https://gateway.storjshare.io";
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Environment variable that overrides `storage.access_grant`.
pub const ACCESS_GRANT_ENV: &str = "UPLOG_ACCESS_GRANT";
