//! Persisted training artifacts.
//!
//! The label encoder and the classifier are stored as JSON files. The
//! classifier artifact carries a fingerprint of the dataset it was fit
//! to; reuse is gated on that fingerprint matching the current dataset,
//! so a stale model is retrained instead of silently trusted.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::encoder::LabelEncoder;
use crate::svm::OneVsRestSvm;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot read artifact {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write artifact {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed artifact {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
}

/// Digest of the dataset a classifier was fit to.
///
/// Covers the class list, which slots embedded successfully, and the
/// embedding dimension; a change to any of them invalidates a persisted
/// classifier.
pub fn dataset_fingerprint(classes: &[String], slot_embedded: &[bool], embedding_dim: usize) -> String {
    let mut hasher = Sha256::new();
    for class in classes {
        hasher.update(class.as_bytes());
        hasher.update([0u8]);
    }
    for &embedded in slot_embedded {
        hasher.update([embedded as u8]);
    }
    hasher.update((embedding_dim as u64).to_le_bytes());

    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Classifier artifact as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    pub dataset_fingerprint: String,
    pub cv_accuracy: f64,
    pub model: OneVsRestSvm,
}

impl ClassifierArtifact {
    pub fn new(model: OneVsRestSvm, dataset_fingerprint: String, cv_accuracy: f64) -> Self {
        Self {
            algorithm: "linear_svm_ovr".to_string(),
            created_at: Utc::now(),
            dataset_fingerprint,
            cv_accuracy,
            model,
        }
    }
}

pub fn save_classifier(path: &Path, artifact: &ClassifierArtifact) -> Result<(), ArtifactError> {
    write_json(path, artifact)
}

pub fn load_classifier(path: &Path) -> Result<ClassifierArtifact, ArtifactError> {
    read_json(path)
}

pub fn save_encoder(path: &Path, encoder: &LabelEncoder) -> Result<(), ArtifactError> {
    write_json(path, encoder)
}

pub fn load_encoder(path: &Path) -> Result<LabelEncoder, ArtifactError> {
    read_json(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Malformed {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ArtifactError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let json = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| ArtifactError::Malformed {
        path: path.display().to_string(),
        source,
    })
}
