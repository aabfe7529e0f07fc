//! Batch embedding pipeline: decode → detect → align → embed.

use image::RgbImage;
use thiserror::Error;

use crate::alignment;
use crate::dataset::{self, DatasetError};
use crate::detector::{largest_face, DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::types::{Embedding, IdentityMetadata};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Embedder(#[from] EmbedderError),
}

/// Embed a single decoded image: largest detected face → align → embed.
pub fn embed_image(
    detector: &mut FaceDetector,
    embedder: &mut FaceEmbedder,
    image: &RgbImage,
) -> Result<Embedding, PipelineError> {
    let faces = detector.detect(image)?;
    let face = largest_face(&faces).ok_or(PipelineError::NoFaceDetected)?;
    let aligned = alignment::align_face(image, face);
    Ok(embedder.embed(&aligned)?)
}

/// Embed every dataset record, producing one slot per record.
///
/// Slot `i` always corresponds to metadata record `i`. A record that
/// fails to embed (unreadable image, no detectable face, inference
/// error) is logged and left as `None`; it never aborts the batch.
pub fn embed_dataset(
    detector: &mut FaceDetector,
    embedder: &mut FaceEmbedder,
    metadata: &[IdentityMetadata],
) -> Vec<Option<Embedding>> {
    let mut slots = Vec::with_capacity(metadata.len());
    let mut failed = 0usize;

    for record in metadata {
        let result = dataset::load_image(&record.image_path())
            .map_err(PipelineError::from)
            .and_then(|image| embed_image(detector, embedder, &image));

        match result {
            Ok(embedding) => slots.push(Some(embedding)),
            Err(error) => {
                failed += 1;
                tracing::warn!(
                    identity = %record.name,
                    file = %record.file,
                    %error,
                    "image not embedded; slot flagged"
                );
                slots.push(None);
            }
        }
    }

    if failed > 0 {
        tracing::warn!(
            failed,
            total = metadata.len(),
            "unembeddable images are flagged and excluded from training"
        );
    }
    slots
}
