//! Face embedding network via ONNX Runtime.
//!
//! Runs a pretrained 128-dimensional embedding network over aligned 96×96
//! RGB face crops. The network was trained with a triplet objective, so
//! same-identity vectors sit close in Euclidean distance; only inference
//! happens here.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::alignment::ALIGNED_SIZE;
use crate::types::Embedding;

/// Output dimension of the embedding network.
pub const EMBEDDING_DIM: usize = 128;

const MODEL_VERSION: &str = "nn4.small2.v1";

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("aligned crop has {got} bytes, expected {expected}")]
    BadCropSize { got: usize, expected: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Pretrained embedding network.
#[derive(Debug)]
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the embedding network from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EmbedderError> {
        if !model_path.exists() {
            return Err(EmbedderError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding network"
        );

        Ok(Self { session })
    }

    /// Embed an aligned 96×96 interleaved-RGB face crop.
    pub fn embed(&mut self, aligned_rgb: &[u8]) -> Result<Embedding, EmbedderError> {
        let expected = ALIGNED_SIZE * ALIGNED_SIZE * 3;
        if aligned_rgb.len() != expected {
            return Err(EmbedderError::BadCropSize {
                got: aligned_rgb.len(),
                expected,
            });
        }

        let input = Self::preprocess(aligned_rgb);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: raw.to_vec(),
            model_version: MODEL_VERSION.to_string(),
        })
    }

    /// Scale an interleaved RGB crop to a [0, 1] NCHW float tensor.
    fn preprocess(rgb: &[u8]) -> Array4<f32> {
        let mut tensor = Array4::<f32>::zeros((1, 3, ALIGNED_SIZE, ALIGNED_SIZE));
        for y in 0..ALIGNED_SIZE {
            for x in 0..ALIGNED_SIZE {
                let off = (y * ALIGNED_SIZE + x) * 3;
                for c in 0..3 {
                    tensor[[0, c, y, x]] = rgb[off + c] as f32 / 255.0;
                }
            }
        }
        tensor
    }
}
