//! Uplog Processing Library
//!
//! The three pipeline stages that look at file contents, plus the
//! orchestrator that threads a file through them:
//!
//! - [`detect`]: classify the input by its leading bytes
//! - [`transcode`]: re-encode eligible images to lossy WebP
//! - [`pipeline`]: detect → transcode → key → upload → URL

pub mod detect;
pub mod pipeline;
pub mod transcode;

// Re-export commonly used types
pub use detect::{detect_bytes, detect_reader, DetectionError, DETECT_READ_LIMIT};
pub use pipeline::{Pipeline, PipelineConfig};
pub use transcode::{
    decide, MediaStream, PassThroughReason, TranscodeDecision, TranscodeError, Transcoder,
};
