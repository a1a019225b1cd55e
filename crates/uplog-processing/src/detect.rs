//! Content-type detection from leading bytes.
//!
//! Only the first [`DETECT_READ_LIMIT`] bytes are inspected. Image formats are
//! recognised by the `image` crate's signature table, everything else by a
//! small table of magic numbers, then UTF-8 text. Anything else is
//! `application/octet-stream`.

use image::ImageFormat;
use tokio::io::{AsyncRead, AsyncReadExt};
use uplog_core::{MediaType, UplogError};

/// Number of leading bytes inspected.
pub const DETECT_READ_LIMIT: usize = 3072;

pub const OCTET_STREAM_MIME: &str = "application/octet-stream";
pub const OCTET_STREAM_EXTENSION: &str = "bin";

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("input is empty")]
    Empty,

    #[error("could not read input: {0}")]
    Unreadable(String),

    #[error("could not classify input: {0}")]
    Unclassified(String),
}

impl From<DetectionError> for UplogError {
    fn from(err: DetectionError) -> Self {
        UplogError::Detection(err.to_string())
    }
}

/// Classify `reader` by reading at most [`DETECT_READ_LIMIT`] bytes.
///
/// The bytes consumed are not put back: callers that go on to read the whole
/// input must rewind it first.
pub async fn detect_reader<R>(reader: &mut R) -> Result<MediaType, DetectionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = Vec::with_capacity(DETECT_READ_LIMIT);
    (&mut *reader)
        .take(DETECT_READ_LIMIT as u64)
        .read_to_end(&mut prefix)
        .await
        .map_err(|e| DetectionError::Unreadable(e.to_string()))?;
    detect_bytes(&prefix)
}

/// Classify an in-memory prefix of a file.
pub fn detect_bytes(data: &[u8]) -> Result<MediaType, DetectionError> {
    if data.is_empty() {
        return Err(DetectionError::Empty);
    }
    let data = &data[..data.len().min(DETECT_READ_LIMIT)];

    if let Some(media_type) = detect_image(data) {
        return media_type;
    }
    if let Some((mime, ext)) = detect_magic(data) {
        return media(mime, ext);
    }
    if let Some((mime, ext)) = detect_text(data) {
        return media(mime, ext);
    }

    tracing::debug!(
        first_bytes = ?&data[..data.len().min(8)],
        "Unknown binary format, uploading as octet-stream"
    );
    media(OCTET_STREAM_MIME, OCTET_STREAM_EXTENSION)
}

fn media(mime: &str, ext: &str) -> Result<MediaType, DetectionError> {
    MediaType::new(mime, ext).map_err(|e| DetectionError::Unclassified(e.to_string()))
}

fn detect_image(data: &[u8]) -> Option<Result<MediaType, DetectionError>> {
    let format = image::guess_format(data).ok()?;

    // PNM signatures are two ASCII characters ("P1".."P7"); plain text can
    // start the same way.
    if format == ImageFormat::Pnm && !data.get(2).is_some_and(|b| b.is_ascii_whitespace()) {
        return None;
    }

    let ext = format.extensions_str().first()?;
    Some(media(format.to_mime_type(), ext))
}

type Signature = (&'static str, &'static str);

fn detect_magic(data: &[u8]) -> Option<Signature> {
    const SIMPLE: &[(&[u8], Signature)] = &[
        (b"%PDF-", ("application/pdf", "pdf")),
        (b"PK\x03\x04", ("application/zip", "zip")),
        (b"PK\x05\x06", ("application/zip", "zip")),
        (b"\x1f\x8b", ("application/gzip", "gz")),
        (b"7z\xbc\xaf\x27\x1c", ("application/x-7z-compressed", "7z")),
        (b"Rar!\x1a\x07", ("application/x-rar-compressed", "rar")),
        (b"fLaC", ("audio/flac", "flac")),
        (b"ID3", ("audio/mpeg", "mp3")),
        (b"\x7fELF", ("application/x-elf", "elf")),
        (b"\0asm", ("application/wasm", "wasm")),
        (b"SQLite format 3\0", ("application/vnd.sqlite3", "sqlite")),
        (b"wOFF", ("font/woff", "woff")),
        (b"wOF2", ("font/woff2", "woff2")),
        (b"OTTO", ("font/otf", "otf")),
        (b"\0\x01\0\0\0", ("font/ttf", "ttf")),
        (b"BZh", ("application/x-bzip2", "bz2")),
        (b"\xfd7zXZ\0", ("application/x-xz", "xz")),
        (b"\x28\xb5\x2f\xfd", ("application/zstd", "zst")),
        (b"MZ", ("application/vnd.microsoft.portable-executable", "exe")),
    ];

    if let Some((_, signature)) = SIMPLE.iter().find(|(magic, _)| data.starts_with(magic)) {
        return Some(*signature);
    }

    if data.len() > 262 && &data[257..262] == b"ustar" {
        return Some(("application/x-tar", "tar"));
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return detect_ftyp(&data[8..12]);
    }
    if data.starts_with(b"\x1a\x45\xdf\xa3") {
        return Some(if contains(data, b"webm") {
            ("video/webm", "webm")
        } else {
            ("video/x-matroska", "mkv")
        });
    }
    if data.starts_with(b"OggS") {
        return Some(if contains(data, b"theora") {
            ("video/ogg", "ogv")
        } else if contains(data, b"OpusHead") {
            ("audio/ogg", "opus")
        } else {
            ("audio/ogg", "ogg")
        });
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        match &data[8..12] {
            b"WAVE" => return Some(("audio/wav", "wav")),
            b"AVI " => return Some(("video/x-msvideo", "avi")),
            _ => {}
        }
    }
    // MPEG audio frame sync without an ID3 tag
    if data.len() >= 2 && data[0] == 0xff && matches!(data[1], 0xfb | 0xf3 | 0xf2) {
        return Some(("audio/mpeg", "mp3"));
    }

    None
}

/// ISO base media file format, keyed on the major brand.
fn detect_ftyp(brand: &[u8]) -> Option<Signature> {
    let signature = match brand {
        b"qt  " => ("video/quicktime", "mov"),
        b"M4A " | b"M4B " => ("audio/x-m4a", "m4a"),
        b"M4V " | b"M4VH" | b"M4VP" => ("video/x-m4v", "m4v"),
        b"avif" | b"avis" => ("image/avif", "avif"),
        b"heic" | b"heix" | b"heim" | b"heis" => ("image/heic", "heic"),
        b"mif1" | b"msf1" => ("image/heif", "heif"),
        b"3gp4" | b"3gp5" | b"3gp6" | b"3g2a" => ("video/3gpp", "3gp"),
        b"isom" | b"iso2" | b"iso4" | b"iso5" | b"iso6" | b"mp41" | b"mp42" | b"avc1"
        | b"dash" | b"MSNV" | b"NDAS" | b"F4V " => ("video/mp4", "mp4"),
        _ => return None,
    };
    Some(signature)
}

fn detect_text(data: &[u8]) -> Option<Signature> {
    if data.contains(&0) {
        return None;
    }
    // A prefix cut in the middle of a multi-byte character is still text.
    let text = match std::str::from_utf8(data) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&data[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };

    let head = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();

    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return Some(("image/svg+xml", "svg"));
    }
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Some(("text/html; charset=utf-8", "html"));
    }
    if head.starts_with("<?xml") {
        return Some(("text/xml; charset=utf-8", "xml"));
    }
    if looks_like_json(text, data.len() >= DETECT_READ_LIMIT) {
        return Some(("application/json", "json"));
    }

    Some(("text/plain; charset=utf-8", "txt"))
}

/// Objects and arrays only. A prefix cut off at the read limit counts as
/// JSON if it parses up to the point where it ends.
fn looks_like_json(text: &str, truncated: bool) -> bool {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(_) => true,
        Err(e) => truncated && e.is_eof(),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
