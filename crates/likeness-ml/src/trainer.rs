//! Training orchestration.
//!
//! Assembles the embedding matrix from per-record slots, splits by index
//! parity, and either reuses a persisted classifier (when its dataset
//! fingerprint matches) or grid-searches a fresh one and persists it
//! together with the label encoder.

use std::path::Path;

use ndarray::Array2;
use thiserror::Error;

use crate::artifacts::{
    self, dataset_fingerprint, ArtifactError, ClassifierArtifact,
};
use crate::encoder::{LabelEncoder, UnknownLabel};
use crate::grid;
use crate::metrics::accuracy_score;
use crate::split::parity_split;
use crate::svm::OneVsRestSvm;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("no dataset records")]
    EmptyDataset,
    #[error("{labels} labels but {slots} embedding slots")]
    LengthMismatch { labels: usize, slots: usize },
    #[error("embedding {index} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        got: usize,
        expected: usize,
    },
    #[error("no embedded training rows; need at least one odd-indexed record with an embedding")]
    NoTrainingData,
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    UnknownLabel(#[from] UnknownLabel),
}

/// Outcome of [`train_or_load`].
#[derive(Debug)]
pub struct TrainReport {
    pub model: OneVsRestSvm,
    pub encoder: LabelEncoder,
    /// Held-out accuracy; `None` when a persisted classifier was reused
    /// (nothing was refit, so nothing is re-scored).
    pub test_accuracy: Option<f64>,
    /// Whether a persisted classifier was reused instead of retrained.
    pub reused: bool,
    /// Records without an embedding, excluded from both split sides.
    pub excluded: usize,
}

/// Train the identity classifier, or reuse a persisted one.
///
/// `labels[i]` and `slots[i]` describe dataset record `i`; a `None` slot
/// marks a record that could not be embedded. A persisted classifier at
/// `classifier_path` is reused only if its dataset fingerprint matches
/// the current class list, slot statuses, and embedding dimension.
pub fn train_or_load(
    labels: &[String],
    slots: &[Option<Vec<f32>>],
    embedding_dim: usize,
    encoder_path: &Path,
    classifier_path: &Path,
) -> Result<TrainReport, TrainError> {
    if labels.is_empty() {
        return Err(TrainError::EmptyDataset);
    }
    if labels.len() != slots.len() {
        return Err(TrainError::LengthMismatch {
            labels: labels.len(),
            slots: slots.len(),
        });
    }

    let encoder = LabelEncoder::fit(labels);
    let y_all = encoder.transform(labels)?;
    let slot_embedded: Vec<bool> = slots.iter().map(Option::is_some).collect();
    let fingerprint = dataset_fingerprint(encoder.classes(), &slot_embedded, embedding_dim);

    if let Some((model, persisted_encoder)) =
        reusable_artifacts(classifier_path, encoder_path, &fingerprint)
    {
        return Ok(TrainReport {
            model,
            encoder: persisted_encoder,
            test_accuracy: None,
            reused: true,
            excluded: slots.iter().filter(|s| s.is_none()).count(),
        });
    }

    let (train_idx, test_idx) = parity_split(labels.len());
    let (x_train, y_train, skipped_train) =
        select_embedded(slots, &y_all, &train_idx, embedding_dim)?;
    let (x_test, y_test, skipped_test) =
        select_embedded(slots, &y_all, &test_idx, embedding_dim)?;
    let excluded = skipped_train + skipped_test;

    if y_train.is_empty() {
        return Err(TrainError::NoTrainingData);
    }

    tracing::info!(
        train = y_train.len(),
        test = y_test.len(),
        excluded,
        classes = encoder.n_classes(),
        "fitting classifier"
    );

    let result = grid::grid_search(x_train.view(), &y_train, encoder.n_classes());

    let test_accuracy = if y_test.is_empty() {
        None
    } else {
        let predicted = result.model.predict_batch(x_test.view());
        Some(accuracy_score(&y_test, &predicted))
    };

    artifacts::save_encoder(encoder_path, &encoder)?;
    let artifact = ClassifierArtifact::new(result.model.clone(), fingerprint, result.best_cv_accuracy);
    artifacts::save_classifier(classifier_path, &artifact)?;

    Ok(TrainReport {
        model: result.model,
        encoder,
        test_accuracy,
        reused: false,
        excluded,
    })
}

/// Load the persisted classifier + encoder pair if both exist, parse, and
/// the classifier's fingerprint matches the current dataset.
fn reusable_artifacts(
    classifier_path: &Path,
    encoder_path: &Path,
    fingerprint: &str,
) -> Option<(OneVsRestSvm, LabelEncoder)> {
    if !classifier_path.exists() {
        return None;
    }

    let artifact = match artifacts::load_classifier(classifier_path) {
        Ok(artifact) => artifact,
        Err(error) => {
            tracing::warn!(%error, "persisted classifier unreadable; retraining");
            return None;
        }
    };
    if artifact.dataset_fingerprint != fingerprint {
        tracing::warn!(
            persisted = %artifact.dataset_fingerprint,
            current = %fingerprint,
            "persisted classifier is stale for this dataset; retraining"
        );
        return None;
    }

    match artifacts::load_encoder(encoder_path) {
        Ok(encoder) => {
            tracing::info!(
                path = %classifier_path.display(),
                created_at = %artifact.created_at,
                "reusing persisted classifier"
            );
            Some((artifact.model, encoder))
        }
        Err(error) => {
            tracing::warn!(%error, "persisted encoder unreadable; retraining");
            None
        }
    }
}

/// Gather the embedded rows among `indices` into a matrix, skipping
/// `None` slots. Returns the matrix, its labels, and the skip count.
fn select_embedded(
    slots: &[Option<Vec<f32>>],
    y_all: &[usize],
    indices: &[usize],
    embedding_dim: usize,
) -> Result<(Array2<f64>, Vec<usize>, usize), TrainError> {
    let mut flat = Vec::new();
    let mut y = Vec::new();
    let mut skipped = 0usize;

    for &i in indices {
        match &slots[i] {
            Some(values) => {
                if values.len() != embedding_dim {
                    return Err(TrainError::DimensionMismatch {
                        index: i,
                        got: values.len(),
                        expected: embedding_dim,
                    });
                }
                flat.extend(values.iter().map(|&v| v as f64));
                y.push(y_all[i]);
            }
            None => skipped += 1,
        }
    }

    let x = Array2::from_shape_vec((y.len(), embedding_dim), flat)
        .expect("row count and dimension are consistent by construction");
    Ok((x, y, skipped))
}
