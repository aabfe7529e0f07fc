use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array1;

use likeness_core::{dataset, pipeline, FaceDetector, FaceEmbedder, EMBEDDING_DIM};
use likeness_ml::{artifacts, trainer};

use crate::config::Config;

pub fn fetch_models(config: &Config) -> Result<()> {
    likeness_models::ensure_detection_model(&config.detection_model_path())
        .context("fetching the face detection model")?;
    println!("models ready in {}", config.model_dir.display());
    Ok(())
}

/// Run the full pipeline: scan → embed → train (or reuse) → report.
pub fn train(config: &Config) -> Result<()> {
    likeness_models::ensure_detection_model(&config.detection_model_path())
        .context("fetching the face detection model")?;

    let mut detector = FaceDetector::load(&config.detection_model_path())?;
    let mut embedder = FaceEmbedder::load(&config.embedding_model_path())?;
    println!("Initialised");

    let metadata = dataset::load_metadata(&config.data_dir)
        .with_context(|| format!("scanning image tree {}", config.data_dir.display()))?;
    let slots = pipeline::embed_dataset(&mut detector, &mut embedder, &metadata);

    let labels: Vec<String> = metadata.iter().map(|m| m.name.clone()).collect();
    let slot_values: Vec<Option<Vec<f32>>> =
        slots.into_iter().map(|s| s.map(|e| e.values)).collect();

    let report = trainer::train_or_load(
        &labels,
        &slot_values,
        EMBEDDING_DIM,
        &config.encoder_path(),
        &config.classifier_path(),
    )?;

    if report.reused {
        println!(
            "loaded persisted classifier from {}",
            config.classifier_path().display()
        );
    } else if let Some(accuracy) = report.test_accuracy {
        println!("SVM accuracy = {accuracy}");
    }
    Ok(())
}

/// Classify a single image against the persisted encoder + classifier.
pub fn recognize(config: &Config, image_path: &Path) -> Result<()> {
    let encoder = artifacts::load_encoder(&config.encoder_path())
        .context("loading the label encoder; run `likeness train` first")?;
    let artifact = artifacts::load_classifier(&config.classifier_path())
        .context("loading the classifier; run `likeness train` first")?;

    let mut detector = FaceDetector::load(&config.detection_model_path())?;
    let mut embedder = FaceEmbedder::load(&config.embedding_model_path())?;

    let image = dataset::load_image(image_path)?;
    let embedding = pipeline::embed_image(&mut detector, &mut embedder, &image)?;

    let features: Array1<f64> = embedding.values.iter().map(|&v| v as f64).collect();
    let label = artifact.model.predict(features.view());
    let name = encoder.decode(label)?;
    println!("recognised as {name}");
    Ok(())
}
