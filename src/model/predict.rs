//! Projection of new samples and variable-correlation summaries for block PLS-DA.

use crate::data::MultiAssay;
use crate::error::{OmicsError, Result};
use crate::model::plsda::PlsdaModel;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Class assignment for projected samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlsdaPrediction {
    /// Sample identifiers of the projected data.
    pub sample_ids: Vec<String>,
    /// Projected variates per block (samples × components).
    pub block_variates: Vec<(String, DMatrix<f64>)>,
    /// Mean of the block variates.
    pub averaged_variates: DMatrix<f64>,
    /// Euclidean distance to each class centroid (samples × classes).
    pub distances: DMatrix<f64>,
    /// Predicted class per sample.
    pub predicted: Vec<String>,
}

impl PlsdaPrediction {
    /// Fraction of samples whose prediction matches `truth`.
    pub fn accuracy(&self, truth: &[String]) -> f64 {
        if truth.is_empty() {
            return f64::NAN;
        }
        let hits = self
            .predicted
            .iter()
            .zip(truth)
            .filter(|(p, t)| p == t)
            .count();
        hits as f64 / truth.len() as f64
    }
}

/// One feature on the correlation circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirclePoint {
    pub block: String,
    pub feature_id: String,
    pub x: f64,
    pub y: f64,
}

impl PlsdaModel {
    /// Project new samples and assign each to the nearest class centroid.
    ///
    /// `new` must carry every fitted block with the same features in the
    /// same order; extra blocks are ignored.
    ///
    /// # Arguments
    /// * `new` - Samples to classify
    ///
    /// # Returns
    /// PlsdaPrediction with projected variates and class assignments.
    pub fn predict(&self, new: &MultiAssay) -> Result<PlsdaPrediction> {
        let n = new.n_samples();
        let mut block_variates = Vec::with_capacity(self.blocks.len());
        let mut averaged = DMatrix::zeros(n, self.ncomp);

        for block in &self.blocks {
            let table = new
                .get(&block.name)
                .ok_or_else(|| OmicsError::UnknownBlock(block.name.clone()))?;
            if table.feature_ids() != block.feature_ids.as_slice() {
                return Err(OmicsError::InvalidParameter(format!(
                    "block '{}' features differ from the fitted model",
                    block.name
                )));
            }
            if table.matrix().iter().any(|v| !v.is_finite()) {
                return Err(OmicsError::InvalidParameter(format!(
                    "block '{}' contains missing or non-finite values",
                    block.name
                )));
            }

            let mut scaled = table.matrix().clone();
            for (j, mut col) in scaled.column_iter_mut().enumerate() {
                for v in col.iter_mut() {
                    *v = (*v - block.means[j]) / block.scales[j];
                }
            }
            let variates = scaled * block.projection_weights()?;
            averaged += &variates;
            block_variates.push((block.name.clone(), variates));
        }
        averaged /= self.blocks.len() as f64;

        let n_classes = self.levels.len();
        let distances = DMatrix::from_fn(n, n_classes, |i, k| {
            (0..self.ncomp)
                .map(|h| (averaged[(i, h)] - self.centroids[(k, h)]).powi(2))
                .sum::<f64>()
                .sqrt()
        });
        let predicted = (0..n)
            .map(|i| {
                let row = distances.row(i);
                self.levels[row.transpose().imin()].clone()
            })
            .collect();

        info!(samples = n, "Projected samples onto block PLS-DA model");

        Ok(PlsdaPrediction {
            sample_ids: new.sample_ids().to_vec(),
            block_variates,
            averaged_variates: averaged,
            distances,
            predicted,
        })
    }

    /// Correlation-circle coordinates for two components.
    ///
    /// Coordinates are correlations between scaled training features and the
    /// averaged variates. Only features with a non-zero loading on either
    /// component are listed.
    pub fn correlation_circle(&self, comp_x: usize, comp_y: usize) -> Result<Vec<CirclePoint>> {
        self.check_component(comp_x)?;
        self.check_component(comp_y)?;

        let mut points = Vec::new();
        for block in &self.blocks {
            for (f, feature_id) in block.feature_ids.iter().enumerate() {
                let selected = block.loadings[(f, comp_x)] != 0.0 || block.loadings[(f, comp_y)] != 0.0;
                if !selected {
                    continue;
                }
                points.push(CirclePoint {
                    block: block.name.clone(),
                    feature_id: feature_id.clone(),
                    x: block.feature_correlations[(f, comp_x)],
                    y: block.feature_correlations[(f, comp_y)],
                });
            }
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AssayTable, Outcome};
    use crate::model::plsda::block_plsda;
    use crate::model::sparse::KeepX;
    use crate::model::plsda::block_splsda;
    use approx::assert_relative_eq;

    fn create_test_data() -> (MultiAssay, Outcome) {
        let ids: Vec<String> = (1..=8).map(|i| format!("S{}", i)).collect();
        let labels: Vec<String> = (0..8)
            .map(|i| if i < 4 { "A" } else { "B" }.to_string())
            .collect();
        let make = |p: usize, offset: f64| {
            let rows: Vec<Vec<f64>> = (0..8)
                .map(|i| {
                    let shift = if i < 4 { 2.0 } else { -2.0 };
                    (0..p)
                        .map(|j| shift * ((j % 2) as f64) + ((i * 3 + j * 5) % 7) as f64 * 0.3 + offset)
                        .collect()
                })
                .collect();
            AssayTable::from_rows(&rows, ids.clone(), (0..p).map(|j| format!("f{}", j)).collect()).unwrap()
        };
        let assays = MultiAssay::new(vec![
            ("rna".to_string(), make(6, 0.0)),
            ("protein".to_string(), make(4, 1.0)),
        ])
        .unwrap();
        (assays, Outcome::categorical(ids, labels).unwrap())
    }

    #[test]
    fn test_training_projection_reproduces_variates() {
        let (assays, outcome) = create_test_data();
        let model = block_plsda(&assays, &outcome, 2).unwrap();
        let prediction = model.predict(&assays).unwrap();
        assert_relative_eq!(prediction.averaged_variates, model.averaged_variates, epsilon = 1e-6);
    }

    #[test]
    fn test_training_samples_classified() {
        let (assays, outcome) = create_test_data();
        let model = block_plsda(&assays, &outcome, 2).unwrap();
        let prediction = model.predict(&assays).unwrap();
        assert_eq!(prediction.accuracy(&model.labels), 1.0);
    }

    #[test]
    fn test_predict_rejects_feature_mismatch() {
        let (assays, outcome) = create_test_data();
        let model = block_plsda(&assays, &outcome, 2).unwrap();
        let reduced = MultiAssay::new(vec![
            ("rna".to_string(), assays.get("rna").unwrap().subset_features(&[0, 1, 2]).unwrap()),
            ("protein".to_string(), assays.get("protein").unwrap().clone()),
        ])
        .unwrap();
        assert!(model.predict(&reduced).is_err());
    }

    #[test]
    fn test_correlation_circle_lists_selected_only() {
        let (assays, outcome) = create_test_data();
        let keep = KeepX::new().with("rna", &[2, 1]).with("protein", &[1, 1]);
        let model = block_splsda(&assays, &outcome, 2, keep).unwrap();
        let points = model.correlation_circle(0, 1).unwrap();

        let rna = points.iter().filter(|p| p.block == "rna").count();
        assert!(rna >= 2 && rna <= 3);
        for p in &points {
            assert!(p.x.abs() <= 1.0 + 1e-12 && p.y.abs() <= 1.0 + 1e-12);
        }
        assert!(model.correlation_circle(0, 2).is_err());
    }
}
