//! Conditional WebP re-encoding.
//!
//! [`decide`] is the whole policy; [`Transcoder::transcode`] only carries it
//! out. A pass-through hands the caller's stream back untouched; an encode
//! consumes it and returns a new in-memory stream.

use std::io::Cursor;
use std::time::Instant;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};
use uplog_core::{MediaType, TranscodePolicy, UplogError};

/// Owned byte stream handed from stage to stage.
pub type MediaStream = Box<dyn AsyncRead + Send + Unpin>;

pub const WEBP_MIME: &str = "image/webp";
pub const WEBP_EXTENSION: &str = "webp";

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("invalid WebP quality {0}: must be between 0 and 100")]
    InvalidQuality(i64),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode WebP: {0}")]
    Encode(String),

    #[error("failed to read image data: {0}")]
    Io(String),
}

impl From<TranscodeError> for UplogError {
    fn from(err: TranscodeError) -> Self {
        UplogError::Transcode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    Disabled,
    NotEligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeDecision {
    PassThrough(PassThroughReason),
    Encode,
}

pub fn decide(media_type: &MediaType, policy: &TranscodePolicy) -> TranscodeDecision {
    if !policy.enabled {
        TranscodeDecision::PassThrough(PassThroughReason::Disabled)
    } else if !policy.is_eligible(media_type) {
        TranscodeDecision::PassThrough(PassThroughReason::NotEligible)
    } else {
        TranscodeDecision::Encode
    }
}

/// Map the configured integer quality onto libwebp's float scale.
pub fn validate_quality(quality: i64) -> Result<f32, TranscodeError> {
    if (0..=100).contains(&quality) {
        Ok(quality as f32)
    } else {
        Err(TranscodeError::InvalidQuality(quality))
    }
}

/// Re-encodes eligible images as lossy WebP.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transcoder;

impl Transcoder {
    pub fn new() -> Self {
        Transcoder
    }

    pub async fn transcode(
        &self,
        mut stream: MediaStream,
        media_type: MediaType,
        policy: &TranscodePolicy,
    ) -> Result<(MediaStream, MediaType), TranscodeError> {
        match decide(&media_type, policy) {
            TranscodeDecision::PassThrough(reason) => {
                debug!(mime = %media_type.mime(), reason = ?reason, "WebP encoding skipped");
                return Ok((stream, media_type));
            }
            TranscodeDecision::Encode => {}
        }

        let quality = validate_quality(policy.quality)?;

        let mut input = Vec::new();
        stream
            .read_to_end(&mut input)
            .await
            .map_err(|e| TranscodeError::Io(e.to_string()))?;
        drop(stream);

        let input_bytes = input.len();
        let start = Instant::now();
        // Decode and encode are CPU-bound; keep them off the async workers.
        let output = tokio::task::spawn_blocking(move || encode_webp(&input, quality))
            .await
            .map_err(|e| TranscodeError::Encode(e.to_string()))??;

        info!(
            from = %media_type.mime(),
            input_bytes = input_bytes,
            output_bytes = output.len(),
            quality = quality,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "WebP encoding successful"
        );

        let webp_type = MediaType::new(WEBP_MIME, WEBP_EXTENSION)
            .map_err(|e| TranscodeError::Encode(e.to_string()))?;
        Ok((Box::new(Cursor::new(output)), webp_type))
    }
}

fn encode_webp(data: &[u8], quality: f32) -> Result<Bytes, TranscodeError> {
    let img = image::load_from_memory(data).map_err(|e| TranscodeError::Decode(e.to_string()))?;

    // Convert to RGBA for WebP encoding
    let rgba_img = img.to_rgba8();
    let (width, height) = rgba_img.dimensions();

    let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
    let webp_data = encoder
        .encode_simple(false, quality)
        .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))?;

    Ok(Bytes::copy_from_slice(&webp_data))
}
