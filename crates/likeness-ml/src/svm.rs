//! Linear SVM over embedding vectors.
//!
//! One binary max-margin separator per identity, combined one-vs-rest for
//! multiclass prediction. Each separator minimizes the primal objective
//! `½‖w‖² + C Σᵢ sᵢ ℓ(yᵢ(w·xᵢ + b))` by full-batch subgradient descent
//! with a step size bounded by the objective's smoothness, so training is
//! deterministic and stable for both loss variants.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Hinge variants for the primal objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// `max(0, 1 - m)`
    Hinge,
    /// `max(0, 1 - m)²`
    SquaredHinge,
}

/// Per-class weighting of misclassification cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample weighs the same.
    Uniform,
    /// Inverse-frequency weights: `n / (n_classes * count(class))`.
    Balanced,
}

/// Hyperparameters for one SVM fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub c: f64,
    pub loss: Loss,
    pub class_weight: ClassWeight,
}

const MAX_ITER: usize = 1000;
const TOL: f64 = 1e-10;

/// A fitted binary separator: `f(x) = w·x + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarySvm {
    weights: Vec<f64>,
    bias: f64,
}

impl BinarySvm {
    pub fn decision_value(&self, x: ArrayView1<f64>) -> f64 {
        self.weights
            .iter()
            .zip(x.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias
    }
}

/// Fit one binary separator for ±1 targets with per-sample cost weights.
fn fit_binary(x: ArrayView2<f64>, y: &[f64], sample_weights: &[f64], params: &SvmParams) -> BinarySvm {
    let n = x.nrows();
    let dim = x.ncols();

    // Smoothness bound of the objective over the augmented inputs (x, 1);
    // 1/L keeps even the squared-hinge subgradient steps contractive.
    let weighted_norms: f64 = (0..n)
        .map(|i| sample_weights[i] * (x.row(i).dot(&x.row(i)) + 1.0))
        .sum();
    let step = 1.0 / (1.0 + 2.0 * params.c * weighted_norms);

    let mut w = Array1::<f64>::zeros(dim);
    let mut b = 0.0f64;

    for _ in 0..MAX_ITER {
        // Subgradient of the loss term, accumulated over all samples.
        let mut grad_w = w.clone();
        let mut grad_b = 0.0f64;

        for i in 0..n {
            let xi = x.row(i);
            let margin = y[i] * (w.dot(&xi) + b);
            let pull = match params.loss {
                Loss::Hinge if margin < 1.0 => 1.0,
                Loss::SquaredHinge if margin < 1.0 => 2.0 * (1.0 - margin),
                _ => continue,
            };
            let coeff = params.c * sample_weights[i] * pull * y[i];
            grad_w.scaled_add(-coeff, &xi);
            grad_b -= coeff;
        }

        w.scaled_add(-step, &grad_w);
        b -= step * grad_b;

        let grad_norm = grad_w.dot(&grad_w) + grad_b * grad_b;
        if grad_norm < TOL {
            break;
        }
    }

    BinarySvm {
        weights: w.to_vec(),
        bias: b,
    }
}

/// Per-sample cost weights derived from the multiclass label frequencies.
fn sample_weights(y: &[usize], n_classes: usize, weighting: ClassWeight) -> Vec<f64> {
    match weighting {
        ClassWeight::Uniform => vec![1.0; y.len()],
        ClassWeight::Balanced => {
            let mut counts = vec![0usize; n_classes];
            for &label in y {
                counts[label] += 1;
            }
            let n = y.len() as f64;
            y.iter()
                .map(|&label| n / (n_classes as f64 * counts[label] as f64))
                .collect()
        }
    }
}

/// One-vs-rest multiclass linear SVM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneVsRestSvm {
    pub params: SvmParams,
    models: Vec<BinarySvm>,
}

impl OneVsRestSvm {
    /// Fit one binary separator per class label in `0..n_classes`.
    pub fn fit(x: ArrayView2<f64>, y: &[usize], n_classes: usize, params: &SvmParams) -> Self {
        debug_assert_eq!(x.nrows(), y.len());
        let weights = sample_weights(y, n_classes, params.class_weight);

        let models = (0..n_classes)
            .map(|class| {
                let targets: Vec<f64> = y
                    .iter()
                    .map(|&label| if label == class { 1.0 } else { -1.0 })
                    .collect();
                fit_binary(x, &targets, &weights, params)
            })
            .collect();

        Self {
            params: *params,
            models,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.models.len()
    }

    /// Predict the class whose separator reports the highest decision value.
    pub fn predict(&self, x: ArrayView1<f64>) -> usize {
        self.models
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.decision_value(x).total_cmp(&b.decision_value(x)))
            .map(|(class, _)| class)
            .unwrap_or(0)
    }

    pub fn predict_batch(&self, x: ArrayView2<f64>) -> Vec<usize> {
        x.outer_iter().map(|row| self.predict(row)).collect()
    }
}
