//! Upload pipeline: detect → transcode → key → upload → URL.
//!
//! Every stage error halts the run and is returned with its original kind.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tracing::info;
use uplog_core::{
    Config, PipelineResult, TranscodePolicy, UplogError, UploadDestination, UrlTemplate,
};
use uplog_storage::{generate_key, KeyPrefix, Storage, Uploader};

use crate::detect::detect_reader;
use crate::transcode::{MediaStream, Transcoder};

/// Everything a run needs besides the storage backend and the input.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub policy: TranscodePolicy,
    pub destination: UploadDestination,
    pub url_template: UrlTemplate,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.transcode_policy(),
            destination: config.destination(),
            url_template: config.url_template(),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    prefix: KeyPrefix,
    transcoder: Transcoder,
    uploader: Uploader,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, storage: Arc<dyn Storage>) -> Self {
        let prefix = KeyPrefix::new(&config.destination.prefix);
        Self {
            config,
            prefix,
            transcoder: Transcoder::new(),
            uploader: Uploader::new(storage),
        }
    }

    /// Run the pipeline on a local file.
    pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<PipelineResult, UplogError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            UplogError::Detection(format!("could not open {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Uploading file");
        self.run(file).await
    }

    /// Run the pipeline on any rewindable source.
    pub async fn run<R>(&self, mut source: R) -> Result<PipelineResult, UplogError>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin + 'static,
    {
        let start = Instant::now();

        let media_type = detect_reader(&mut source).await?;
        info!(mime = %media_type.mime(), extension = %media_type.extension(), "Detected media type");

        source
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| UplogError::Detection(format!("could not rewind input: {}", e)))?;

        let stream: MediaStream = Box::new(source);
        let (mut stream, media_type) = self
            .transcoder
            .transcode(stream, media_type, &self.config.policy)
            .await?;

        let object_key = generate_key(&self.prefix, &media_type);
        let receipt = self
            .uploader
            .upload(&mut stream, &self.config.destination, &object_key)
            .await?;

        let url = self.config.url_template.format(
            &self.config.destination.bucket,
            self.prefix.as_str(),
            &object_key.filename,
        );

        info!(
            bucket = %receipt.bucket,
            key = %receipt.key,
            size_bytes = receipt.size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Pipeline complete"
        );

        Ok(PipelineResult {
            media_type,
            key: object_key.key,
            filename: object_key.filename,
            url,
            size_bytes: receipt.size_bytes,
        })
    }
}
