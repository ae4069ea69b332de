//! Block PLS-DA (multi-block partial least squares discriminant analysis).
//!
//! Each assay block and the dummy-coded outcome are linked through a design
//! matrix. Per component, a generalized canonical iteration (Horst scheme)
//! finds one loading vector per block, optionally soft-thresholded to a fixed
//! number of features (sparse mode). Assay blocks are deflated on their own
//! variate before the next component.

use crate::data::{MultiAssay, Outcome};
use crate::error::{OmicsError, Result};
use crate::model::sparse::{count_nonzero, soft_threshold_keep, KeepX};
use crate::normalize::{center_scale, dummy_encode, pearson};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for block (s)PLS-DA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlsdaConfig {
    /// Number of components.
    pub ncomp: usize,
    /// Features kept per block per component. Empty means non-sparse.
    pub keep_x: KeepX,
    /// Link weight between two assay blocks. Blocks link to the outcome with 1.0.
    pub design_weight: f64,
    /// Scale every feature to unit variance after centering.
    pub scale: bool,
    /// Convergence tolerance on the summed absolute loading change.
    pub tol: f64,
    /// Maximum iterations per component.
    pub max_iter: usize,
}

impl Default for PlsdaConfig {
    fn default() -> Self {
        Self {
            ncomp: 2,
            keep_x: KeepX::new(),
            design_weight: 0.1,
            scale: true,
            tol: 1e-6,
            max_iter: 100,
        }
    }
}

impl PlsdaConfig {
    /// Default configuration with `ncomp` components.
    pub fn new(ncomp: usize) -> Self {
        Self {
            ncomp,
            ..Default::default()
        }
    }

    /// Restrict features per block and component.
    pub fn keep_x(mut self, keep_x: KeepX) -> Self {
        self.keep_x = keep_x;
        self
    }

    /// Set the block-to-block design weight.
    pub fn design_weight(mut self, weight: f64) -> Self {
        self.design_weight = weight;
        self
    }

    /// Set convergence tolerance.
    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set maximum iterations per component.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// A feature retained on a component, with its loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeature {
    pub feature_id: String,
    pub index: usize,
    pub loading: f64,
}

/// Fitted quantities for one assay block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlsdaBlock {
    /// Block name.
    pub name: String,
    /// Feature identifiers, in column order.
    pub feature_ids: Vec<String>,
    /// Loading vectors (features × components), unit norm per column.
    pub loadings: DMatrix<f64>,
    /// Block variates (samples × components).
    pub variates: DMatrix<f64>,
    /// Regression of the residual block on its variate (features × components).
    pub deflation_loadings: DMatrix<f64>,
    /// Correlation of each scaled feature with the averaged variates.
    pub feature_correlations: DMatrix<f64>,
    /// Mean squared correlation of the features with this block's variate.
    pub explained_variance: Vec<f64>,
    /// Mean of each feature within each class (features × classes), raw units.
    pub class_means: DMatrix<f64>,
    /// Column means used for centering.
    pub means: Vec<f64>,
    /// Column divisors used for scaling.
    pub scales: Vec<f64>,
    /// Keep count per component.
    pub keep: Vec<usize>,
}

impl PlsdaBlock {
    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    /// Loadings of one component.
    pub fn component_loadings(&self, comp: usize) -> Vec<f64> {
        self.loadings.column(comp).iter().copied().collect()
    }

    /// Number of non-zero loadings on a component.
    pub fn n_selected(&self, comp: usize) -> usize {
        count_nonzero(self.loadings.column(comp).iter().copied())
    }

    /// Features with a non-zero loading, ranked by absolute loading.
    pub fn selected_features(&self, comp: usize) -> Vec<SelectedFeature> {
        let mut selected: Vec<SelectedFeature> = self
            .loadings
            .column(comp)
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| SelectedFeature {
                feature_id: self.feature_ids[i].clone(),
                index: i,
                loading: *v,
            })
            .collect();
        selected.sort_by(|a, b| {
            b.loading
                .abs()
                .partial_cmp(&a.loading.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        selected
    }

    /// Projection weights `A (PᵀA)⁻¹` mapping scaled data to variates.
    pub fn projection_weights(&self) -> Result<DMatrix<f64>> {
        let pta = self.deflation_loadings.transpose() * &self.loadings;
        let inverse = pta.try_inverse().ok_or_else(|| {
            OmicsError::Numerical(format!(
                "projection weights for block '{}' are singular",
                self.name
            ))
        })?;
        Ok(&self.loadings * inverse)
    }
}

/// Fitted block (s)PLS-DA model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlsdaModel {
    /// Training sample identifiers.
    pub sample_ids: Vec<String>,
    /// Training class labels.
    pub labels: Vec<String>,
    /// Sorted outcome levels.
    pub levels: Vec<String>,
    /// Number of components.
    pub ncomp: usize,
    /// Per-block results, in input order.
    pub blocks: Vec<PlsdaBlock>,
    /// Outcome loadings (classes × components).
    pub outcome_loadings: DMatrix<f64>,
    /// Outcome variates (samples × components).
    pub outcome_variates: DMatrix<f64>,
    /// Mean of the assay-block variates (samples × components).
    pub averaged_variates: DMatrix<f64>,
    /// Class centroids of the averaged variates (classes × components).
    pub centroids: DMatrix<f64>,
    /// Iterations used per component.
    pub iterations: Vec<usize>,
    /// Whether each component met the tolerance.
    pub converged: Vec<bool>,
    /// Whether any block was restricted.
    pub sparse: bool,
    /// Configuration used.
    pub config: PlsdaConfig,
}

impl PlsdaModel {
    /// Look up a block by name.
    pub fn block(&self, name: &str) -> Result<&PlsdaBlock> {
        self.blocks
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| OmicsError::UnknownBlock(name.to_string()))
    }

    /// Block names in order.
    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name.as_str()).collect()
    }

    /// Selected features of one block and component, ranked by |loading|.
    pub fn selected_features(&self, block: &str, comp: usize) -> Result<Vec<SelectedFeature>> {
        self.check_component(comp)?;
        Ok(self.block(block)?.selected_features(comp))
    }

    /// Variates of a block, or the averaged variates when `block` is `None`.
    pub fn variates(&self, block: Option<&str>) -> Result<&DMatrix<f64>> {
        match block {
            Some(name) => Ok(&self.block(name)?.variates),
            None => Ok(&self.averaged_variates),
        }
    }

    pub(crate) fn check_component(&self, comp: usize) -> Result<()> {
        if comp >= self.ncomp {
            return Err(OmicsError::InvalidParameter(format!(
                "component {} requested but the model has {}",
                comp + 1,
                self.ncomp
            )));
        }
        Ok(())
    }
}

/// Fit non-sparse block PLS-DA with default settings.
///
/// # Arguments
/// * `assays` - Aligned assay blocks
/// * `outcome` - Categorical outcome aligned with the assays
/// * `ncomp` - Number of components
pub fn block_plsda(assays: &MultiAssay, outcome: &Outcome, ncomp: usize) -> Result<PlsdaModel> {
    fit_block_plsda(assays, outcome, &PlsdaConfig::new(ncomp))
}

/// Fit sparse block PLS-DA keeping `keep_x` features per block and component.
pub fn block_splsda(
    assays: &MultiAssay,
    outcome: &Outcome,
    ncomp: usize,
    keep_x: KeepX,
) -> Result<PlsdaModel> {
    fit_block_plsda(assays, outcome, &PlsdaConfig::new(ncomp).keep_x(keep_x))
}

/// Fit block (s)PLS-DA.
///
/// # Arguments
/// * `assays` - Aligned assay blocks (samples × features each)
/// * `outcome` - Categorical outcome aligned with the assays
/// * `config` - Component count, keep counts, design and iteration settings
///
/// # Returns
/// PlsdaModel with loadings, variates, explained variance and prediction state.
pub fn fit_block_plsda(assays: &MultiAssay, outcome: &Outcome, config: &PlsdaConfig) -> Result<PlsdaModel> {
    assays.check_outcome(outcome)?;
    let labels = outcome
        .labels()
        .ok_or_else(|| {
            OmicsError::InvalidParameter("discriminant analysis needs a categorical outcome".to_string())
        })?
        .to_vec();
    let levels = outcome.levels();
    let class_idx = outcome.class_indices().unwrap_or_default();
    validate(assays, &levels, config)?;
    let keep = config.keep_x.resolve(assays, config.ncomp)?;

    let n_samples = assays.n_samples();
    let n_blocks = assays.n_blocks();
    let ncomp = config.ncomp;

    info!(
        blocks = n_blocks,
        samples = n_samples,
        classes = levels.len(),
        ncomp,
        sparse = !config.keep_x.is_empty(),
        "Fitting block PLS-DA"
    );

    // Scaled blocks, then the outcome in the last slot.
    let mut scaled = Vec::with_capacity(n_blocks + 1);
    for (name, table) in assays.iter() {
        let block = center_scale(table.matrix(), config.scale)?;
        if block.n_constant > 0 {
            warn!(block = name, constant = block.n_constant, "Block has zero-variance features");
        }
        scaled.push(block);
    }
    let y = dummy_encode(&class_idx, levels.len());
    scaled.push(center_scale(&y, true)?);

    let design = design_matrix(n_blocks, config.design_weight);
    let mut residuals: Vec<DMatrix<f64>> = scaled.iter().map(|s| s.data.clone()).collect();

    let mut loadings: Vec<DMatrix<f64>> = residuals
        .iter()
        .map(|r| DMatrix::zeros(r.ncols(), ncomp))
        .collect();
    let mut variates: Vec<DMatrix<f64>> = residuals
        .iter()
        .map(|_| DMatrix::zeros(n_samples, ncomp))
        .collect();
    let mut deflation: Vec<DMatrix<f64>> = residuals
        .iter()
        .map(|r| DMatrix::zeros(r.ncols(), ncomp))
        .collect();
    let mut iterations = Vec::with_capacity(ncomp);
    let mut converged = Vec::with_capacity(ncomp);

    for h in 0..ncomp {
        let keep_h: Vec<usize> = keep.iter().map(|k| k[h]).collect();
        let fit = fit_component(&residuals, &design, &keep_h, config.tol, config.max_iter)?;
        debug!(component = h + 1, iterations = fit.iterations, delta = fit.delta, "Component fitted");
        if !fit.converged {
            warn!(
                component = h + 1,
                max_iter = config.max_iter,
                delta = fit.delta,
                "Component did not reach tolerance"
            );
        }
        iterations.push(fit.iterations);
        converged.push(fit.converged);

        for j in 0..=n_blocks {
            let t = &fit.variates[j];
            loadings[j].set_column(h, &fit.loadings[j]);
            variates[j].set_column(h, t);
            // The outcome is never deflated.
            if j < n_blocks {
                let p = deflate(&mut residuals[j], t)?;
                deflation[j].set_column(h, &p);
            }
        }
    }

    let mut averaged = DMatrix::zeros(n_samples, ncomp);
    for v in &variates[..n_blocks] {
        averaged += v;
    }
    averaged /= n_blocks as f64;

    let centroids = class_centroids(&averaged, &class_idx, levels.len());

    let mut blocks = Vec::with_capacity(n_blocks);
    for (j, (name, table)) in assays.iter().enumerate() {
        let data = &scaled[j].data;
        let explained_variance = (0..ncomp)
            .map(|h| mean_squared_correlation(data, &variates[j].column(h).iter().copied().collect::<Vec<_>>()))
            .collect();
        let feature_correlations = correlation_matrix(data, &averaged);
        blocks.push(PlsdaBlock {
            name: name.to_string(),
            feature_ids: table.feature_ids().to_vec(),
            loadings: loadings[j].clone(),
            variates: variates[j].clone(),
            deflation_loadings: deflation[j].clone(),
            feature_correlations,
            explained_variance,
            class_means: class_means(table.matrix(), &class_idx, levels.len()),
            means: scaled[j].means.clone(),
            scales: scaled[j].scales.clone(),
            keep: keep[j].clone(),
        });
    }

    info!(iterations = ?iterations, "Block PLS-DA complete");

    Ok(PlsdaModel {
        sample_ids: assays.sample_ids().to_vec(),
        labels,
        levels,
        ncomp,
        blocks,
        outcome_loadings: loadings[n_blocks].clone(),
        outcome_variates: variates[n_blocks].clone(),
        averaged_variates: averaged,
        centroids,
        iterations,
        converged,
        sparse: !config.keep_x.is_empty(),
        config: config.clone(),
    })
}

fn validate(assays: &MultiAssay, levels: &[String], config: &PlsdaConfig) -> Result<()> {
    if config.ncomp == 0 {
        return Err(OmicsError::InvalidParameter("ncomp must be at least 1".to_string()));
    }
    if levels.len() < 2 {
        return Err(OmicsError::InvalidParameter(format!(
            "outcome needs at least two classes, found {}",
            levels.len()
        )));
    }
    if !(0.0..=1.0).contains(&config.design_weight) {
        return Err(OmicsError::InvalidParameter(format!(
            "design weight {} must be between 0 and 1",
            config.design_weight
        )));
    }
    if config.tol <= 0.0 || config.max_iter == 0 {
        return Err(OmicsError::InvalidParameter(
            "tol must be positive and max_iter at least 1".to_string(),
        ));
    }

    let min_width = assays.iter().map(|(_, t)| t.n_features()).min().unwrap_or(0);
    if config.ncomp > min_width {
        return Err(OmicsError::InvalidParameter(format!(
            "ncomp {} exceeds the smallest block width {}",
            config.ncomp, min_width
        )));
    }
    if config.ncomp >= assays.n_samples() {
        return Err(OmicsError::InvalidParameter(format!(
            "ncomp {} must be smaller than the number of samples {}",
            config.ncomp,
            assays.n_samples()
        )));
    }

    for (name, table) in assays.iter() {
        if table.matrix().iter().any(|v| !v.is_finite()) {
            return Err(OmicsError::InvalidParameter(format!(
                "block '{}' contains missing or non-finite values",
                name
            )));
        }
    }
    Ok(())
}

/// Full design: assay blocks linked to each other with `weight` and to the
/// outcome (last row/column) with 1.0. Zero diagonal.
pub fn design_matrix(n_blocks: usize, weight: f64) -> DMatrix<f64> {
    let size = n_blocks + 1;
    DMatrix::from_fn(size, size, |i, j| {
        if i == j {
            0.0
        } else if i == n_blocks || j == n_blocks {
            1.0
        } else {
            weight
        }
    })
}

struct ComponentFit {
    loadings: Vec<DVector<f64>>,
    variates: Vec<DVector<f64>>,
    iterations: usize,
    delta: f64,
    converged: bool,
}

/// One component of the Horst-scheme generalized canonical iteration.
///
/// `keep` has one entry per assay block; the outcome block (last residual)
/// is never thresholded.
fn fit_component(
    residuals: &[DMatrix<f64>],
    design: &DMatrix<f64>,
    keep: &[usize],
    tol: f64,
    max_iter: usize,
) -> Result<ComponentFit> {
    let n_all = residuals.len();
    let outcome = n_all - 1;

    let x_concat = hstack(&residuals[..outcome]);
    let mut loadings = Vec::with_capacity(n_all);
    for (j, r) in residuals.iter().enumerate() {
        let cross = if j == outcome {
            r.tr_mul(&x_concat)
        } else {
            r.tr_mul(&residuals[outcome])
        };
        let mut a = leading_left_singular_vector(&cross)?;
        if j < outcome {
            soft_threshold_keep(&mut a, keep[j]);
        }
        normalize_in_place(&mut a)?;
        loadings.push(a);
    }
    let mut variates: Vec<DVector<f64>> = residuals.iter().zip(&loadings).map(|(r, a)| r * a).collect();

    let mut delta = f64::INFINITY;
    let mut iterations = 0;
    while iterations < max_iter {
        iterations += 1;
        let previous = loadings.clone();

        for j in 0..n_all {
            let mut z = DVector::zeros(residuals[j].nrows());
            for k in 0..n_all {
                let c = design[(j, k)];
                if k != j && c != 0.0 {
                    z += &variates[k] * c;
                }
            }
            let mut a = residuals[j].tr_mul(&z);
            if j < outcome {
                soft_threshold_keep(&mut a, keep[j]);
            }
            normalize_in_place(&mut a)?;
            variates[j] = &residuals[j] * &a;
            loadings[j] = a;
        }

        delta = loadings
            .iter()
            .zip(&previous)
            .map(|(a, b)| a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum::<f64>())
            .sum();
        if delta < tol {
            break;
        }
    }

    Ok(ComponentFit {
        loadings,
        variates,
        iterations,
        delta,
        converged: delta < tol,
    })
}

/// Deflate `x` on variate `t`, returning the regression coefficients `p`.
fn deflate(x: &mut DMatrix<f64>, t: &DVector<f64>) -> Result<DVector<f64>> {
    let tt = t.dot(t);
    if tt <= f64::EPSILON {
        return Err(OmicsError::Numerical(
            "variate collapsed to zero; reduce ncomp".to_string(),
        ));
    }
    let p = x.tr_mul(t) / tt;
    *x -= t * p.transpose();
    Ok(p)
}

fn leading_left_singular_vector(m: &DMatrix<f64>) -> Result<DVector<f64>> {
    let svd = m.clone().svd(true, false);
    let u = svd
        .u
        .ok_or_else(|| OmicsError::Numerical("SVD did not return singular vectors".to_string()))?;
    let idx = svd.singular_values.imax();
    let mut v = u.column(idx).into_owned();
    // Largest entry positive, so repeated fits agree in sign.
    let pivot = v.iamax();
    if v[pivot] < 0.0 {
        v.neg_mut();
    }
    Ok(v)
}

fn normalize_in_place(a: &mut DVector<f64>) -> Result<()> {
    let norm = a.norm();
    if !(norm > f64::MIN_POSITIVE) || !norm.is_finite() {
        return Err(OmicsError::Numerical(
            "loading vector vanished during iteration".to_string(),
        ));
    }
    *a /= norm;
    Ok(())
}

fn hstack(blocks: &[DMatrix<f64>]) -> DMatrix<f64> {
    let n = blocks.first().map(|b| b.nrows()).unwrap_or(0);
    let width: usize = blocks.iter().map(|b| b.ncols()).sum();
    let mut out = DMatrix::zeros(n, width);
    let mut offset = 0;
    for b in blocks {
        out.columns_mut(offset, b.ncols()).copy_from(b);
        offset += b.ncols();
    }
    out
}

fn mean_squared_correlation(data: &DMatrix<f64>, variate: &[f64]) -> f64 {
    let p = data.ncols();
    if p == 0 {
        return 0.0;
    }
    let total: f64 = (0..p)
        .map(|f| {
            let col: Vec<f64> = data.column(f).iter().copied().collect();
            let r = pearson(&col, variate);
            if r.is_finite() {
                r * r
            } else {
                0.0
            }
        })
        .sum();
    total / p as f64
}

/// Pearson correlation of every column of `data` with every column of `variates`.
pub(crate) fn correlation_matrix(data: &DMatrix<f64>, variates: &DMatrix<f64>) -> DMatrix<f64> {
    let comps: Vec<Vec<f64>> = variates
        .column_iter()
        .map(|c| c.iter().copied().collect())
        .collect();
    let rows: Vec<Vec<f64>> = (0..data.ncols())
        .into_par_iter()
        .map(|f| {
            let col: Vec<f64> = data.column(f).iter().copied().collect();
            comps
                .iter()
                .map(|t| {
                    let r = pearson(&col, t);
                    if r.is_finite() {
                        r
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();
    DMatrix::from_fn(data.ncols(), variates.ncols(), |i, j| rows[i][j])
}

fn class_centroids(variates: &DMatrix<f64>, class_idx: &[usize], n_classes: usize) -> DMatrix<f64> {
    let mut sums = DMatrix::zeros(n_classes, variates.ncols());
    let mut counts = vec![0usize; n_classes];
    for (i, &k) in class_idx.iter().enumerate() {
        counts[k] += 1;
        for h in 0..variates.ncols() {
            sums[(k, h)] += variates[(i, h)];
        }
    }
    for (k, &count) in counts.iter().enumerate() {
        if count > 0 {
            for h in 0..variates.ncols() {
                sums[(k, h)] /= count as f64;
            }
        }
    }
    sums
}

fn class_means(data: &DMatrix<f64>, class_idx: &[usize], n_classes: usize) -> DMatrix<f64> {
    DMatrix::from_fn(data.ncols(), n_classes, |f, k| {
        let values: Vec<f64> = class_idx
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == k)
            .map(|(i, _)| data[(i, f)])
            .filter(|v| !v.is_nan())
            .collect();
        if values.is_empty() {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    })
}
