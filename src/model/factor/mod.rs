//! Multi-view factor analysis (MOFA-style) by variational inference.
//!
//! Every assay is a view over the shared samples. A small number of latent
//! factors is learned jointly; per-view ARD priors switch factors off in
//! views where they carry no signal, so variance explained is view-specific.

pub mod updates;
pub mod variance;

pub use updates::VariationalState;
pub use variance::{factor_correlation, r2_per_factor, r2_total};

use crate::data::MultiAssay;
use crate::error::{OmicsError, Result};
use crate::normalize::{column_mean_sd, scale_view};
use crate::persist;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Convergence speed presets, as tolerances on the relative ELBO change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceMode {
    #[default]
    Fast,
    Medium,
    Slow,
}

impl ConvergenceMode {
    /// Tolerance on |ΔELBO| / |ELBO at iteration 1|.
    pub fn tolerance(&self) -> f64 {
        match self {
            ConvergenceMode::Fast => 5e-6,
            ConvergenceMode::Medium => 5e-7,
            ConvergenceMode::Slow => 5e-8,
        }
    }
}

impl std::str::FromStr for ConvergenceMode {
    type Err = OmicsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(ConvergenceMode::Fast),
            "medium" => Ok(ConvergenceMode::Medium),
            "slow" => Ok(ConvergenceMode::Slow),
            other => Err(OmicsError::InvalidParameter(format!(
                "unknown convergence mode '{}' (expected fast, medium or slow)",
                other
            ))),
        }
    }
}

/// Training options for the factor model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorOptions {
    /// Divide each view by its overall standard deviation.
    pub scale_views: bool,
    /// Subtract each feature's mean before fitting.
    pub center_features: bool,
    /// Number of latent factors.
    pub num_factors: usize,
    /// Convergence preset.
    pub convergence_mode: ConvergenceMode,
    /// Maximum number of sweeps.
    pub max_iter: usize,
    /// Seed for factor initialization.
    pub seed: u64,
    /// Where to write the binary training artifact, if anywhere.
    pub training_output: Option<PathBuf>,
}

impl Default for FactorOptions {
    fn default() -> Self {
        Self {
            scale_views: false,
            center_features: true,
            num_factors: 10,
            convergence_mode: ConvergenceMode::Fast,
            max_iter: 1000,
            seed: 42,
            training_output: None,
        }
    }
}

/// Raw training state written during fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub view_names: Vec<String>,
    pub sample_ids: Vec<String>,
    pub state: VariationalState,
    pub elbo: Vec<f64>,
    pub iterations: usize,
    pub seed: u64,
}

/// Fitted factor model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorModel {
    /// View (assay) names.
    pub view_names: Vec<String>,
    /// Shared sample identifiers.
    pub sample_ids: Vec<String>,
    /// Feature identifiers per view.
    pub feature_ids: Vec<Vec<String>>,
    /// Factor scores (samples × factors).
    pub scores: DMatrix<f64>,
    /// Weights per view (features × factors).
    pub weights: Vec<DMatrix<f64>>,
    /// Variance explained per view and factor (views × factors).
    pub r2: DMatrix<f64>,
    /// Variance explained per view by all factors.
    pub r2_total: Vec<f64>,
    /// ELBO after each sweep.
    pub elbo: Vec<f64>,
    /// Number of sweeps run.
    pub iterations: usize,
    /// Whether the tolerance was met.
    pub converged: bool,
    /// Divisor applied to each view when scaling.
    pub view_scales: Vec<f64>,
    /// Options used for training.
    pub options: FactorOptions,
}

impl FactorModel {
    /// Number of factors.
    pub fn n_factors(&self) -> usize {
        self.scores.ncols()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.scores.nrows()
    }

    /// Factor labels, "Factor1", "Factor2", ...
    pub fn factor_names(&self) -> Vec<String> {
        (1..=self.n_factors()).map(|k| format!("Factor{}", k)).collect()
    }

    /// Index of a view by name.
    pub fn view_index(&self, name: &str) -> Result<usize> {
        self.view_names
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| OmicsError::UnknownBlock(name.to_string()))
    }

    /// Scores of one factor across samples.
    pub fn factor_scores(&self, factor: usize) -> Result<Vec<f64>> {
        if factor >= self.n_factors() {
            return Err(OmicsError::InvalidParameter(format!(
                "factor {} requested but the model has {}",
                factor + 1,
                self.n_factors()
            )));
        }
        Ok(self.scores.column(factor).iter().copied().collect())
    }

    /// Pearson correlation between factors.
    pub fn factor_correlation(&self) -> DMatrix<f64> {
        factor_correlation(&self.scores)
    }

    /// Features of a view with the largest absolute weight on a factor.
    pub fn top_weights(&self, view: &str, factor: usize, n: usize) -> Result<Vec<(String, f64)>> {
        let m = self.view_index(view)?;
        self.factor_scores(factor)?;
        let mut ranked: Vec<(String, f64)> = self.feature_ids[m]
            .iter()
            .cloned()
            .zip(self.weights[m].column(factor).iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(n);
        Ok(ranked)
    }
}

/// Fit the factor model on every block of `assays`.
///
/// Views are transposed to features × samples. Training sweeps update the
/// weights, ARD precisions, factors and noise precisions in turn, then
/// evaluate the ELBO.
///
/// # Arguments
/// * `assays` - Aligned views; missing values (`NaN`) are allowed
/// * `options` - Training options
///
/// # Returns
/// FactorModel, or a convergence error if `max_iter` sweeps were not enough.
pub fn fit_factor_model(assays: &MultiAssay, options: &FactorOptions) -> Result<FactorModel> {
    let n_samples = assays.n_samples();
    if options.num_factors == 0 {
        return Err(OmicsError::InvalidParameter("num_factors must be at least 1".to_string()));
    }
    if options.num_factors > n_samples {
        return Err(OmicsError::InvalidParameter(format!(
            "num_factors {} exceeds the number of samples {}",
            options.num_factors, n_samples
        )));
    }
    if options.max_iter == 0 {
        return Err(OmicsError::InvalidParameter("max_iter must be at least 1".to_string()));
    }
    if !options.center_features {
        warn!("Features are not centered; factors may capture feature means");
    }

    let mut views = Vec::with_capacity(assays.n_blocks());
    let mut view_scales = Vec::with_capacity(assays.n_blocks());
    for (name, table) in assays.iter() {
        if table.n_missing() == table.n_samples() * table.n_features() {
            return Err(OmicsError::EmptyData(format!("view '{}' has no observed values", name)));
        }
        let (view, scale) = prepare_view(table.features_by_samples(), options);
        view_scales.push(scale);
        views.push(view);
    }

    let tol = options.convergence_mode.tolerance();
    info!(
        views = views.len(),
        samples = n_samples,
        factors = options.num_factors,
        tol,
        seed = options.seed,
        "Training factor model"
    );

    let mut state = VariationalState::initialize(&views, n_samples, options.num_factors, options.seed);
    let mut elbo: Vec<f64> = Vec::new();
    let mut delta = f64::INFINITY;
    let mut converged = false;

    for iteration in 1..=options.max_iter {
        state.update_weights(&views);
        state.update_alpha();
        state.update_factors(&views);
        state.update_tau(&views);

        let current = state.elbo(&views);
        if !current.is_finite() {
            return Err(OmicsError::Numerical(format!(
                "ELBO became non-finite at iteration {}",
                iteration
            )));
        }
        if let Some(&previous) = elbo.last() {
            let reference = elbo[0].abs().max(f64::MIN_POSITIVE);
            delta = (current - previous).abs() / reference;
        }
        elbo.push(current);
        debug!(iteration, elbo = current, delta, "Sweep");

        if delta < tol {
            converged = true;
            break;
        }
    }

    let iterations = elbo.len();
    if !converged {
        return Err(OmicsError::Convergence { iterations, delta });
    }
    info!(iterations, elbo = elbo[iterations - 1], "Factor model converged");

    if let Some(path) = &options.training_output {
        persist::write_training_artifact(
            path,
            &TrainingArtifact {
                view_names: assays.names().iter().map(|s| s.to_string()).collect(),
                sample_ids: assays.sample_ids().to_vec(),
                state: state.clone(),
                elbo: elbo.clone(),
                iterations,
                seed: options.seed,
            },
        )?;
    }

    let scores = state.z_mean.clone();
    let n_factors = options.num_factors;
    let mut r2 = DMatrix::zeros(views.len(), n_factors);
    let mut totals = Vec::with_capacity(views.len());
    for (m, view) in views.iter().enumerate() {
        let per_factor = r2_per_factor(view, &state.w_mean[m], &scores);
        for (k, value) in per_factor.into_iter().enumerate() {
            r2[(m, k)] = value;
        }
        totals.push(r2_total(view, &state.w_mean[m], &scores));
    }

    Ok(FactorModel {
        view_names: assays.names().iter().map(|s| s.to_string()).collect(),
        sample_ids: assays.sample_ids().to_vec(),
        feature_ids: assays.iter().map(|(_, t)| t.feature_ids().to_vec()).collect(),
        scores,
        weights: state.w_mean,
        r2,
        r2_total: totals,
        elbo,
        iterations,
        converged,
        view_scales,
        options: options.clone(),
    })
}

/// Center features and optionally scale the whole view.
fn prepare_view(mut view: DMatrix<f64>, options: &FactorOptions) -> (DMatrix<f64>, f64) {
    if options.center_features {
        for mut row in view.row_iter_mut() {
            let (mean, _) = column_mean_sd(row.iter().copied());
            if mean.is_finite() {
                for v in row.iter_mut() {
                    *v -= mean;
                }
            }
        }
    }
    if options.scale_views {
        scale_view(&view)
    } else {
        (view, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AssayTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::{Distribution, Normal};
    use tempfile::TempDir;

    fn create_test_data() -> MultiAssay {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let noise = Normal::new(0.0, 0.3).unwrap();
        let n = 20;
        let ids: Vec<String> = (1..=n).map(|i| format!("S{}", i)).collect();
        let latent: Vec<f64> = (0..n).map(|i| (i as f64 - 9.5) / 5.0).collect();
        let mut view = |p: usize, prefix: &str| {
            let rows: Vec<Vec<f64>> = (0..n)
                .map(|i| (0..p).map(|j| (j as f64 + 1.0) * latent[i] + noise.sample(&mut rng)).collect())
                .collect();
            AssayTable::from_rows(&rows, ids.clone(), (0..p).map(|j| format!("{}{}", prefix, j)).collect())
                .unwrap()
        };
        let rna = view(6, "g");
        let protein = view(4, "p");
        MultiAssay::new(vec![("rna".to_string(), rna), ("protein".to_string(), protein)]).unwrap()
    }

    fn options() -> FactorOptions {
        FactorOptions {
            num_factors: 2,
            max_iter: 2000,
            ..Default::default()
        }
    }

    #[test]
    fn test_fit_recovers_shared_factor() {
        let model = fit_factor_model(&create_test_data(), &options()).unwrap();
        assert!(model.converged);
        assert_eq!(model.scores.shape(), (20, 2));
        assert_eq!(model.weights[0].shape(), (6, 2));
        assert_eq!(model.r2.shape(), (2, 2));
        for total in &model.r2_total {
            assert!(*total > 0.5, "total r2 {}", total);
        }
    }

    #[test]
    fn test_same_seed_same_scores() {
        let data = create_test_data();
        let a = fit_factor_model(&data, &options()).unwrap();
        let b = fit_factor_model(&data, &options()).unwrap();
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.elbo, b.elbo);
    }

    #[test]
    fn test_non_convergence_is_error() {
        let opts = FactorOptions {
            max_iter: 2,
            convergence_mode: ConvergenceMode::Slow,
            ..options()
        };
        let result = fit_factor_model(&create_test_data(), &opts);
        assert!(matches!(result, Err(OmicsError::Convergence { iterations: 2, .. })));
    }

    #[test]
    fn test_training_artifact_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("training.bin");
        let opts = FactorOptions {
            training_output: Some(path.clone()),
            ..options()
        };
        let model = fit_factor_model(&create_test_data(), &opts).unwrap();
        let artifact = persist::read_training_artifact(&path).unwrap();
        assert_eq!(artifact.iterations, model.iterations);
        assert_eq!(artifact.state.z_mean, model.scores);
    }

    #[test]
    fn test_invalid_options() {
        let data = create_test_data();
        let zero = FactorOptions {
            num_factors: 0,
            ..options()
        };
        assert!(matches!(fit_factor_model(&data, &zero), Err(OmicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_convergence_mode_parsing() {
        assert_eq!("Medium".parse::<ConvergenceMode>().unwrap(), ConvergenceMode::Medium);
        assert!("quick".parse::<ConvergenceMode>().is_err());
        assert!(ConvergenceMode::Slow.tolerance() < ConvergenceMode::Fast.tolerance());
    }
}
