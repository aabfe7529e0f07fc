use std::path::PathBuf;

/// Pipeline configuration, loaded from `LIKENESS_*` environment variables
/// with defaults. CLI flags override individual fields after loading.
pub struct Config {
    /// Root of the labeled image tree (one subdirectory per identity).
    pub data_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory the encoder/classifier artifacts are written to.
    pub artifacts_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let model_dir = std::env::var("LIKENESS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| likeness_models::default_model_dir());

        Self {
            data_dir: env_path("LIKENESS_DATA_DIR", "images"),
            model_dir,
            artifacts_dir: env_path("LIKENESS_ARTIFACTS_DIR", "."),
        }
    }

    pub fn detection_model_path(&self) -> PathBuf {
        self.model_dir.join(likeness_models::DETECTION_MODEL_FILE)
    }

    pub fn embedding_model_path(&self) -> PathBuf {
        self.model_dir.join(likeness_models::EMBEDDING_MODEL_FILE)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.artifacts_dir.join("encoder.json")
    }

    pub fn classifier_path(&self) -> PathBuf {
        self.artifacts_dir.join("svm.json")
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
