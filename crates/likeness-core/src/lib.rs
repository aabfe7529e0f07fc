//! likeness-core — dataset scanning, face detection, landmark alignment,
//! and embedding extraction for the likeness pipeline.
//!
//! Detection and embedding run via ONNX Runtime for CPU inference.

pub mod alignment;
pub mod dataset;
pub mod detector;
pub mod embedder;
pub mod pipeline;
pub mod types;

pub use detector::FaceDetector;
pub use embedder::{FaceEmbedder, EMBEDDING_DIM};
pub use types::{BoundingBox, Embedding, IdentityMetadata};
