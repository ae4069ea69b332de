//! Column centering and scaling for assay blocks.

use crate::error::{OmicsError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A centered (and optionally unit-variance) block with the parameters used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaledBlock {
    /// Transformed data (samples × features). Missing values stay `NaN`.
    pub data: DMatrix<f64>,
    /// Column means of the input.
    pub means: Vec<f64>,
    /// Column divisors (standard deviation, or 1.0 when not scaling).
    pub scales: Vec<f64>,
    /// Number of zero-variance columns (left centered, divisor 1.0).
    pub n_constant: usize,
}

impl ScaledBlock {
    /// Apply the stored centering and scaling to new samples.
    pub fn apply(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if data.ncols() != self.means.len() {
            return Err(OmicsError::DimensionMismatch {
                expected: self.means.len(),
                actual: data.ncols(),
            });
        }
        let mut out = data.clone();
        for (j, mut col) in out.column_iter_mut().enumerate() {
            for v in col.iter_mut() {
                *v = (*v - self.means[j]) / self.scales[j];
            }
        }
        Ok(out)
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }
}

/// Center every column, and divide by its standard deviation if `scale`.
///
/// Statistics ignore `NaN` cells. The standard deviation uses the n-1
/// denominator.
pub fn center_scale(data: &DMatrix<f64>, scale: bool) -> Result<ScaledBlock> {
    let (n_samples, n_features) = data.shape();
    if n_samples == 0 || n_features == 0 {
        return Err(OmicsError::EmptyData("Cannot scale an empty block".to_string()));
    }

    let stats: Vec<(f64, f64)> = (0..n_features)
        .into_par_iter()
        .map(|j| column_mean_sd(data.column(j).iter().copied()))
        .collect();

    let mut means = Vec::with_capacity(n_features);
    let mut scales = Vec::with_capacity(n_features);
    let mut n_constant = 0;
    for (j, &(mean, sd)) in stats.iter().enumerate() {
        if mean.is_nan() {
            return Err(OmicsError::EmptyData(format!(
                "column {} has no observed values",
                j
            )));
        }
        means.push(mean);
        if !scale {
            scales.push(1.0);
        } else if !is_constant_sd(sd) {
            scales.push(sd);
        } else {
            n_constant += 1;
            scales.push(1.0);
        }
    }

    let mut scaled = data.clone();
    for (j, mut col) in scaled.column_iter_mut().enumerate() {
        for v in col.iter_mut() {
            *v = (*v - means[j]) / scales[j];
        }
    }

    Ok(ScaledBlock {
        data: scaled,
        means,
        scales,
        n_constant,
    })
}

/// Standard deviations at or below this are treated as constant columns.
pub(crate) fn is_constant_sd(sd: f64) -> bool {
    sd.is_nan() || sd <= 1e-12
}

/// Number of columns whose observed values are not all equal.
pub fn count_varying_columns(data: &DMatrix<f64>) -> usize {
    (0..data.ncols())
        .filter(|&j| !is_constant_sd(column_mean_sd(data.column(j).iter().copied()).1))
        .count()
}

/// Mean and sample standard deviation of the non-missing values.
pub fn column_mean_sd<I: Iterator<Item = f64>>(values: I) -> (f64, f64) {
    let observed: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    let n = observed.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

/// Divide a whole view by its overall standard deviation.
///
/// Brings views of very different widths and dynamic ranges to unit total
/// variance, so no single view dominates a joint factor model.
pub fn scale_view(data: &DMatrix<f64>) -> (DMatrix<f64>, f64) {
    let (_, sd) = column_mean_sd(data.iter().copied());
    let divisor = if sd.is_finite() && sd > 1e-12 { sd } else { 1.0 };
    (data.map(|v| v / divisor), divisor)
}

/// Indicator (one-hot) matrix for class memberships: samples × classes.
pub fn dummy_encode(class_indices: &[usize], n_classes: usize) -> DMatrix<f64> {
    let mut y = DMatrix::zeros(class_indices.len(), n_classes);
    for (i, &k) in class_indices.iter().enumerate() {
        if k < n_classes {
            y[(i, k)] = 1.0;
        }
    }
    y
}

/// Pearson correlation on pairwise-complete observations.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in &pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_data() -> DMatrix<f64> {
        // 4 samples × 3 features; feature 2 is constant
        DMatrix::from_row_slice(4, 3, &[
            1.0, 10.0, 5.0,
            2.0, 20.0, 5.0,
            3.0, 30.0, 5.0,
            4.0, 40.0, 5.0,
        ])
    }

    #[test]
    fn test_center_scale_unit_variance() {
        let scaled = center_scale(&create_test_data(), true).unwrap();
        for j in 0..2 {
            let (mean, sd) = column_mean_sd(scaled.data.column(j).iter().copied());
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(sd, 1.0, epsilon = 1e-12);
        }
        assert_eq!(scaled.n_constant, 1);
        assert!(scaled.data.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_center_only() {
        let scaled = center_scale(&create_test_data(), false).unwrap();
        assert_relative_eq!(scaled.data[(0, 1)], -15.0);
        assert_eq!(scaled.scales, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_missing_values_ignored() {
        let data = DMatrix::from_row_slice(3, 1, &[1.0, f64::NAN, 3.0]);
        let scaled = center_scale(&data, false).unwrap();
        assert_relative_eq!(scaled.means[0], 2.0);
        assert!(scaled.data[(1, 0)].is_nan());
    }

    #[test]
    fn test_apply_matches_fit() {
        let data = create_test_data();
        let scaled = center_scale(&data, true).unwrap();
        let again = scaled.apply(&data).unwrap();
        assert_relative_eq!(again, scaled.data, epsilon = 1e-12);
    }

    #[test]
    fn test_dummy_encode() {
        let y = dummy_encode(&[0, 1, 1], 2);
        assert_eq!(y, DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_pearson() {
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0, epsilon = 1e-12);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[3.0, 2.0, 1.0]), 0.0);
    }
}
