//! likeness-models — model asset locations and fetching.
//!
//! The face detection model is fetched once from a fixed URL and cached in
//! the model directory; the embedding network is expected to be installed
//! by the user (it is not redistributable from here).

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

/// Fixed URL of the gzip-compressed face detection model.
pub const DETECTION_MODEL_URL: &str =
    "https://github.com/sovren-software/likeness/releases/download/models-v1/det_500m.onnx.gz";

/// File name of the face detection model inside the model directory.
pub const DETECTION_MODEL_FILE: &str = "det_500m.onnx";

/// File name of the pretrained embedding network inside the model directory.
pub const EMBEDDING_MODEL_FILE: &str = "nn4.small2.v1.onnx";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("download failed for {url}: {source}")]
    Http {
        url: String,
        source: Box<ureq::Error>,
    },
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        source: io::Error,
    },
}

/// Default model directory: `$XDG_DATA_HOME/likeness/models`
/// (or `~/.local/share/likeness/models`).
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("likeness/models")
}

/// Ensure the detection model is present, downloading it if absent.
///
/// Skipped entirely when `dst` already exists; a stale or truncated file
/// is never refreshed, so delete it to force a re-download. No retry: any
/// network or filesystem error propagates and aborts the run.
pub fn ensure_detection_model(dst: &Path) -> Result<(), FetchError> {
    if dst.exists() {
        tracing::debug!(path = %dst.display(), "detection model already present");
        return Ok(());
    }
    download_gz(DETECTION_MODEL_URL, dst)
}

/// Stream a gzip-compressed resource from `url` to `dst`, decompressing
/// incrementally. The parent directory is created if needed.
pub fn download_gz(url: &str, dst: &Path) -> Result<(), FetchError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|source| FetchError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }

    tracing::info!(url, path = %dst.display(), "downloading model");
    let response = ureq::get(url).call().map_err(|source| FetchError::Http {
        url: url.to_string(),
        source: Box::new(source),
    })?;

    decompress_to(response.into_reader(), dst)
}

/// Decompress a gzip stream into `dst`.
fn decompress_to(reader: impl Read, dst: &Path) -> Result<(), FetchError> {
    let io_err = |source| FetchError::Io {
        path: dst.display().to_string(),
        source,
    };
    let mut decoder = GzDecoder::new(reader);
    let mut out = File::create(dst).map_err(io_err)?;
    let written = io::copy(&mut decoder, &mut out).map_err(io_err)?;
    tracing::info!(path = %dst.display(), bytes = written, "model written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_ensure_skips_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join(DETECTION_MODEL_FILE);
        fs::write(&dst, b"not a real model").unwrap();

        // The URL is never contacted when the file exists, so this must
        // succeed even without network access.
        ensure_detection_model(&dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"not a real model");
    }

    #[test]
    fn test_decompress_roundtrip() {
        let payload = b"onnx bytes go here".repeat(100);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("model.onnx");
        decompress_to(compressed.as_slice(), &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), payload);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("model.onnx");
        let result = decompress_to(&b"definitely not gzip"[..], &dst);
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }

    #[test]
    fn test_default_model_dir_ends_with_crate_path() {
        let dir = default_model_dir();
        assert!(dir.ends_with("likeness/models"));
    }
}
