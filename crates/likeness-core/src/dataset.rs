//! Dataset scanning and image loading.
//!
//! The image tree is laid out as `<root>/<identity>/<file>.jpg|jpeg`, one
//! subdirectory per identity. Scanning is fully deterministic: identities
//! and files are both visited in lexicographic order.

use std::fs;
use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::types::IdentityMetadata;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read dataset directory {path}: {source}")]
    ReadDir {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot decode image {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
}

/// Scan `<root>/<identity>/<file>` into an ordered metadata list.
///
/// Only files with an exact lowercase `.jpg` or `.jpeg` extension are
/// kept. Non-directories directly under the root are skipped. A missing
/// or unreadable root is fatal.
pub fn load_metadata(root: &Path) -> Result<Vec<IdentityMetadata>, DatasetError> {
    let mut records = Vec::new();

    for identity in sorted_entries(root)? {
        let dir = root.join(&identity);
        if !dir.is_dir() {
            continue;
        }
        for file in sorted_entries(&dir)? {
            if is_image_file(&file) {
                records.push(IdentityMetadata::new(root, identity.clone(), file));
            }
        }
    }

    tracing::info!(records = records.len(), root = %root.display(), "dataset scanned");
    Ok(records)
}

/// Decode an image file to interleaved RGB8.
pub fn load_image(path: &Path) -> Result<RgbImage, DatasetError> {
    let img = image::open(path).map_err(|source| DatasetError::Decode {
        path: path.display().to_string(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// Reverse the channel order of an interleaved 3-channel buffer in place
/// (BGR ↔ RGB). Applying it twice restores the original bytes. Used when
/// ingesting buffers from BGR-ordered sources.
pub fn reverse_channel_order(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

fn sorted_entries(path: &Path) -> Result<Vec<String>, DatasetError> {
    let read_err = |source| DatasetError::ReadDir {
        path: path.display().to_string(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == "jpg" || ext == "jpeg")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    fn build_tree(root: &Path, identities: &[(&str, &[&str])]) {
        for (identity, files) in identities {
            let dir = root.join(identity);
            fs::create_dir_all(&dir).unwrap();
            for file in *files {
                touch(&dir.join(file));
            }
        }
    }

    #[test]
    fn test_metadata_sorted_at_both_levels() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(
            tmp.path(),
            &[
                ("zoe", &["b.jpg", "a.jpg"]),
                ("ada", &["2.jpeg", "1.jpg"]),
            ],
        );

        let records = load_metadata(tmp.path()).unwrap();
        let listing: Vec<(String, String)> = records
            .iter()
            .map(|m| (m.name.clone(), m.file.clone()))
            .collect();

        assert_eq!(
            listing,
            vec![
                ("ada".into(), "1.jpg".into()),
                ("ada".into(), "2.jpeg".into()),
                ("zoe".into(), "a.jpg".into()),
                ("zoe".into(), "b.jpg".into()),
            ]
        );
    }

    #[test]
    fn test_metadata_filters_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(
            tmp.path(),
            &[("ada", &["ok.jpg", "ok.jpeg", "skip.png", "skip.JPG", "notes.txt"])],
        );

        let records = load_metadata(tmp.path()).unwrap();
        let files: Vec<&str> = records.iter().map(|m| m.file.as_str()).collect();
        assert_eq!(files, vec!["ok.jpeg", "ok.jpg"]);
    }

    #[test]
    fn test_metadata_skips_files_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(tmp.path(), &[("ada", &["1.jpg"])]);
        touch(&tmp.path().join("stray.jpg"));

        let records = load_metadata(tmp.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ada");
    }

    #[test]
    fn test_metadata_missing_root_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            load_metadata(&missing),
            Err(DatasetError::ReadDir { .. })
        ));
    }

    #[test]
    fn test_metadata_paths_resolve_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(tmp.path(), &[("ada", &["1.jpg"])]);

        let records = load_metadata(tmp.path()).unwrap();
        assert_eq!(records[0].image_path(), tmp.path().join("ada").join("1.jpg"));
        assert!(records[0].image_path().exists());
    }

    #[test]
    fn test_channel_reversal_roundtrip() {
        let original: Vec<u8> = (0u8..=251).collect(); // 84 pixels
        let mut buf = original.clone();
        reverse_channel_order(&mut buf);
        assert_ne!(buf, original);
        reverse_channel_order(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_channel_reversal_swaps_first_and_third() {
        let mut buf = vec![10, 20, 30, 40, 50, 60];
        reverse_channel_order(&mut buf);
        assert_eq!(buf, vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn test_load_image_bad_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.jpg");
        fs::write(&path, b"not a jpeg").unwrap();
        assert!(matches!(
            load_image(&path),
            Err(DatasetError::Decode { .. })
        ));
    }
}
