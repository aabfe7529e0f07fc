//! likeness-ml — identity label encoding, linear SVM grid search, and
//! artifact persistence for the likeness pipeline.
//!
//! Operates on plain embedding buffers so it stays independent of how
//! the embeddings were produced.

pub mod artifacts;
pub mod encoder;
pub mod grid;
pub mod metrics;
pub mod split;
pub mod svm;
pub mod trainer;

pub use encoder::LabelEncoder;
pub use svm::{ClassWeight, Loss, OneVsRestSvm, SvmParams};
pub use trainer::{train_or_load, TrainReport};
