//! Hyperparameter grid search with k-fold cross-validation.

use ndarray::{Array2, ArrayView2, Axis};

use crate::metrics::accuracy_score;
use crate::svm::{ClassWeight, Loss, OneVsRestSvm, SvmParams};

/// Regularization grid.
pub const C_GRID: [f64; 7] = [0.05, 0.5, 1.0, 1.5, 2.0, 5.0, 10.0];
/// Loss grid.
pub const LOSS_GRID: [Loss; 2] = [Loss::Hinge, Loss::SquaredHinge];
/// Class-weight grid.
pub const CLASS_WEIGHT_GRID: [ClassWeight; 2] = [ClassWeight::Uniform, ClassWeight::Balanced];
/// Cross-validation fold count.
pub const CV_FOLDS: usize = 3;

/// Winning configuration and the model refit on the full training set.
#[derive(Debug)]
pub struct GridSearchResult {
    pub best_params: SvmParams,
    pub best_cv_accuracy: f64,
    pub model: OneVsRestSvm,
}

/// Every parameter combination, in grid order.
pub fn parameter_grid() -> Vec<SvmParams> {
    let mut grid = Vec::with_capacity(C_GRID.len() * LOSS_GRID.len() * CLASS_WEIGHT_GRID.len());
    for &c in &C_GRID {
        for &loss in &LOSS_GRID {
            for &class_weight in &CLASS_WEIGHT_GRID {
                grid.push(SvmParams {
                    c,
                    loss,
                    class_weight,
                });
            }
        }
    }
    grid
}

/// Exhaustively evaluate the grid with [`CV_FOLDS`]-fold cross-validation
/// and refit the accuracy-maximal configuration on all of `x`/`y`.
///
/// Ties keep the earliest grid entry.
pub fn grid_search(x: ArrayView2<f64>, y: &[usize], n_classes: usize) -> GridSearchResult {
    let grid = parameter_grid();

    let mut best_params = grid[0];
    let mut best_cv_accuracy = f64::NEG_INFINITY;

    for params in grid {
        let score = cross_validate(x, y, n_classes, &params);
        tracing::debug!(
            c = params.c,
            loss = ?params.loss,
            class_weight = ?params.class_weight,
            score,
            "grid point evaluated"
        );
        if score > best_cv_accuracy {
            best_cv_accuracy = score;
            best_params = params;
        }
    }

    tracing::info!(
        c = best_params.c,
        loss = ?best_params.loss,
        class_weight = ?best_params.class_weight,
        cv_accuracy = best_cv_accuracy,
        "grid search complete; refitting on the full training set"
    );

    let model = OneVsRestSvm::fit(x, y, n_classes, &best_params);
    GridSearchResult {
        best_params,
        best_cv_accuracy,
        model,
    }
}

/// Mean validation accuracy over contiguous folds.
///
/// Folds that would leave the training side empty are skipped; with fewer
/// samples than folds the trailing empty folds simply contribute nothing.
fn cross_validate(x: ArrayView2<f64>, y: &[usize], n_classes: usize, params: &SvmParams) -> f64 {
    let n = y.len();
    let mut scores = Vec::with_capacity(CV_FOLDS);

    for range in fold_ranges(n, CV_FOLDS) {
        if range.is_empty() || range.len() == n {
            continue;
        }

        let train_idx: Vec<usize> = (0..n).filter(|i| !range.contains(i)).collect();
        let val_idx: Vec<usize> = range.collect();

        let x_train: Array2<f64> = x.select(Axis(0), &train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let x_val: Array2<f64> = x.select(Axis(0), &val_idx);
        let y_val: Vec<usize> = val_idx.iter().map(|&i| y[i]).collect();

        let model = OneVsRestSvm::fit(x_train.view(), &y_train, n_classes, params);
        let predicted = model.predict_batch(x_val.view());
        scores.push(accuracy_score(&y_val, &predicted));
    }

    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Contiguous fold boundaries for `n` samples; the first `n % folds`
/// folds take one extra sample.
fn fold_ranges(n: usize, folds: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / folds;
    let extra = n % folds;
    let mut ranges = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let len = base + usize::from(fold < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn clusters(per_class: usize, n_classes: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for class in 0..n_classes {
            for i in 0..per_class {
                let mut row = vec![0.0f64; n_classes];
                row[class] = 1.0 + (i as f64) * 0.05;
                rows.push(row);
                y.push(class);
            }
        }
        let flat: Vec<f64> = rows.concat();
        (
            Array2::from_shape_vec((y.len(), n_classes), flat).unwrap(),
            y,
        )
    }

    #[test]
    fn test_grid_covers_all_combinations() {
        let grid = parameter_grid();
        assert_eq!(grid.len(), 7 * 2 * 2);

        // No duplicates.
        for (i, a) in grid.iter().enumerate() {
            for b in &grid[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_fold_ranges_partition() {
        for n in [0usize, 1, 2, 3, 7, 25, 50] {
            let ranges = fold_ranges(n, CV_FOLDS);
            assert_eq!(ranges.len(), CV_FOLDS);
            let mut covered = Vec::new();
            for range in ranges {
                covered.extend(range);
            }
            assert_eq!(covered, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_fold_sizes_even() {
        let ranges = fold_ranges(25, 3);
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![9, 8, 8]);
    }

    #[test]
    fn test_grid_search_separable_reaches_full_accuracy() {
        // Class-sorted rows would leave whole classes out of a contiguous
        // fold, so interleave them the way the parity split produces.
        let (x_sorted, y_sorted) = clusters(6, 3);
        let mut order: Vec<usize> = Vec::new();
        for offset in 0..6 {
            for class in 0..3 {
                order.push(class * 6 + offset);
            }
        }
        let x = x_sorted.select(ndarray::Axis(0), &order);
        let y: Vec<usize> = order.iter().map(|&i| y_sorted[i]).collect();

        let result = grid_search(x.view(), &y, 3);
        assert!(result.best_cv_accuracy > 0.9, "cv = {}", result.best_cv_accuracy);

        let predicted = result.model.predict_batch(x.view());
        assert_eq!(predicted, y);
    }

    #[test]
    fn test_cross_validate_handles_tiny_sets() {
        let (x, y) = clusters(1, 2);
        // Two samples, three folds: must not panic, score is defined.
        let params = SvmParams {
            c: 1.0,
            loss: Loss::Hinge,
            class_weight: ClassWeight::Uniform,
        };
        let score = cross_validate(x.view(), &y, 2, &params);
        assert!((0.0..=1.0).contains(&score));
    }
}
