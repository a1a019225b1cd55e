//! End-to-end pipeline tests against the in-memory and filesystem backends.
//!
//! Run with: `cargo test -p uplog-processing --test pipeline_test`

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use uplog_core::{ErrorKind, TranscodePolicy, UploadDestination, UrlTemplate};
use uplog_processing::{Pipeline, PipelineConfig};
use uplog_storage::{LocalStorage, MemoryStorage, Storage};

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

fn config(enabled: bool, quality: i64) -> PipelineConfig {
    PipelineConfig {
        policy: TranscodePolicy {
            enabled,
            eligible_mime_types: vec!["image/png".to_string()],
            quality,
        },
        destination: UploadDestination {
            access_grant: "grant".to_string(),
            bucket: "uplog".to_string(),
            prefix: "folder".to_string(),
        },
        url_template: UrlTemplate::new("https://example.com/{{bucket}}/{{prefix}}/{{filename}}"),
    }
}

#[tokio::test]
async fn test_png_is_uploaded_as_webp() {
    let storage = MemoryStorage::new();
    let pipeline = Pipeline::new(config(true, 75), Arc::new(storage.clone()));

    let result = pipeline.run(Cursor::new(png_bytes())).await.unwrap();

    assert_eq!(result.media_type.mime(), "image/webp");
    assert!(result.key.starts_with("folder/"));
    assert!(result.key.ends_with(".webp"));
    assert!(result.filename.ends_with(".webp"));
    assert!(result.url.contains(&result.filename));
    assert_eq!(
        result.url,
        format!("https://example.com/uplog/folder//{}", result.filename)
    );

    let project = storage.open_project("grant").await.unwrap();
    let stored = project.get_object("uplog", &result.key).await.unwrap();
    assert_eq!(stored.len() as u64, result.size_bytes);
    let decoded = webp::Decoder::new(&stored).decode().unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 100));
}

#[tokio::test]
async fn test_disabled_transcoding_uploads_original_bytes() {
    let storage = MemoryStorage::new();
    let pipeline = Pipeline::new(config(false, 75), Arc::new(storage.clone()));
    let input = png_bytes();

    let result = pipeline.run(Cursor::new(input.clone())).await.unwrap();

    assert_eq!(result.media_type.mime(), "image/png");
    assert!(result.key.ends_with(".png"));

    let project = storage.open_project("grant").await.unwrap();
    let stored = project.get_object("uplog", &result.key).await.unwrap();
    assert_eq!(stored.as_ref(), input.as_slice());
}

#[tokio::test]
async fn test_invalid_quality_stops_before_upload() {
    let storage = MemoryStorage::new();
    let pipeline = Pipeline::new(config(true, 120), Arc::new(storage.clone()));

    let err = pipeline.run(Cursor::new(png_bytes())).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transcode);
    assert!(!storage.has_bucket("uplog"));
}

#[tokio::test]
async fn test_unknown_binary_is_uploaded_as_octet_stream() {
    let storage = MemoryStorage::new();
    let pipeline = Pipeline::new(config(true, 75), Arc::new(storage.clone()));
    let input = vec![0x00, 0x9f, 0x92, 0x96, 0x00, 0x01];

    let result = pipeline.run(Cursor::new(input.clone())).await.unwrap();

    assert_eq!(result.media_type.mime(), "application/octet-stream");
    assert!(result.filename.ends_with(".bin"));

    let project = storage.open_project("grant").await.unwrap();
    let stored = project.get_object("uplog", &result.key).await.unwrap();
    assert_eq!(stored.as_ref(), input.as_slice());
}

#[tokio::test]
async fn test_rejected_credential_is_auth_error() {
    let storage = MemoryStorage::new().with_access("another-grant");
    let pipeline = Pipeline::new(config(true, 75), Arc::new(storage));

    let err = pipeline.run(Cursor::new(b"hello".to_vec())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_missing_file_is_detection_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(true, 75), Arc::new(MemoryStorage::new()));

    let err = pipeline
        .run_file(dir.path().join("does-not-exist.png"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Detection);
}

#[tokio::test]
async fn test_run_file_into_local_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.md");
    std::fs::write(&input, "# Notes\n\n- uplog\n").unwrap();

    let storage = LocalStorage::new(dir.path().join("store")).await.unwrap();
    let pipeline = Pipeline::new(config(true, 75), Arc::new(storage));

    let result = pipeline.run_file(&input).await.unwrap();

    assert!(result.media_type.is("text/plain"));
    assert!(result.filename.ends_with(".txt"));
    let on_disk = dir
        .path()
        .join("store")
        .join("uplog")
        .join("folder")
        .join(&result.filename);
    assert_eq!(
        std::fs::read_to_string(on_disk).unwrap(),
        "# Notes\n\n- uplog\n"
    );
}
