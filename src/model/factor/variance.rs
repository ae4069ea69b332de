//! Variance decomposition of a fitted factor model.

use crate::normalize::pearson;
use nalgebra::DMatrix;

/// Fraction of variance explained in one view by each factor.
///
/// `view` is features × samples, `weights` features × factors and `scores`
/// samples × factors. R² of factor k is `1 - SS(y - w_k z_k) / SS(y)` over
/// observed entries, where SS(y) is taken about zero (data are centered
/// before fitting).
pub fn r2_per_factor(view: &DMatrix<f64>, weights: &DMatrix<f64>, scores: &DMatrix<f64>) -> Vec<f64> {
    let total = total_ss(view);
    (0..scores.ncols())
        .map(|k| {
            let mut residual = 0.0;
            for d in 0..view.nrows() {
                for n in 0..view.ncols() {
                    let y = view[(d, n)];
                    if !y.is_nan() {
                        residual += (y - weights[(d, k)] * scores[(n, k)]).powi(2);
                    }
                }
            }
            ratio(residual, total)
        })
        .collect()
}

/// Fraction of variance explained in one view by all factors jointly.
pub fn r2_total(view: &DMatrix<f64>, weights: &DMatrix<f64>, scores: &DMatrix<f64>) -> f64 {
    let fitted = weights * scores.transpose();
    let mut residual = 0.0;
    for d in 0..view.nrows() {
        for n in 0..view.ncols() {
            let y = view[(d, n)];
            if !y.is_nan() {
                residual += (y - fitted[(d, n)]).powi(2);
            }
        }
    }
    ratio(residual, total_ss(view))
}

/// Pearson correlation between every pair of factors (factors × factors).
pub fn factor_correlation(scores: &DMatrix<f64>) -> DMatrix<f64> {
    let columns: Vec<Vec<f64>> = scores.column_iter().map(|c| c.iter().copied().collect()).collect();
    let k = columns.len();
    DMatrix::from_fn(k, k, |i, j| {
        if i == j {
            1.0
        } else {
            pearson(&columns[i], &columns[j])
        }
    })
}

fn total_ss(view: &DMatrix<f64>) -> f64 {
    view.iter().filter(|v| !v.is_nan()).map(|v| v * v).sum()
}

fn ratio(residual: f64, total: f64) -> f64 {
    if total > 0.0 {
        1.0 - residual / total
    } else {
        0.0
    }
}
