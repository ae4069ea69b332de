//! Mean-field variational updates for the multi-view factor model.
//!
//! Notation follows the generative model: for view `m`, feature `d`, sample
//! `n`, `y[d, n] = Σ_k w[d, k] z[n, k] + ε` with `ε ~ N(0, 1/τ[m][d])`,
//! `z ~ N(0, 1)` and `w[d, k] ~ N(0, 1/α[m][k])`. Every posterior factor is
//! Gaussian (`z`, `w`) or Gamma (`α`, `τ`). Missing entries (`NaN`) drop out
//! of every sum.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::{digamma, ln_gamma};

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Shape and rate of the Gamma hyper-priors on `α` and `τ`.
pub const PRIOR_SHAPE: f64 = 1e-14;
pub const PRIOR_RATE: f64 = 1e-14;

/// Posterior moments of every latent variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationalState {
    /// E[z] (samples × factors).
    pub z_mean: DMatrix<f64>,
    /// Var[z] (samples × factors).
    pub z_var: DMatrix<f64>,
    /// E[w] per view (features × factors).
    pub w_mean: Vec<DMatrix<f64>>,
    /// Var[w] per view (features × factors).
    pub w_var: Vec<DMatrix<f64>>,
    /// Gamma shape of α per view and factor.
    pub alpha_shape: Vec<Vec<f64>>,
    /// Gamma rate of α per view and factor.
    pub alpha_rate: Vec<Vec<f64>>,
    /// Gamma shape of τ per view and feature.
    pub tau_shape: Vec<Vec<f64>>,
    /// Gamma rate of τ per view and feature.
    pub tau_rate: Vec<Vec<f64>>,
}

impl VariationalState {
    /// Seeded initial state: factors drawn from N(0, 1), weights zero,
    /// unit precisions.
    pub fn initialize(views: &[DMatrix<f64>], n_samples: usize, n_factors: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let z_mean = DMatrix::from_fn(n_samples, n_factors, |_, _| StandardNormal.sample(&mut rng));

        Self {
            z_mean,
            z_var: DMatrix::from_element(n_samples, n_factors, 1.0),
            w_mean: views.iter().map(|v| DMatrix::zeros(v.nrows(), n_factors)).collect(),
            w_var: views.iter().map(|v| DMatrix::from_element(v.nrows(), n_factors, 1.0)).collect(),
            alpha_shape: views.iter().map(|_| vec![1.0; n_factors]).collect(),
            alpha_rate: views.iter().map(|_| vec![1.0; n_factors]).collect(),
            tau_shape: views.iter().map(|v| vec![1.0; v.nrows()]).collect(),
            tau_rate: views.iter().map(|v| vec![1.0; v.nrows()]).collect(),
        }
    }

    pub fn n_factors(&self) -> usize {
        self.z_mean.ncols()
    }

    pub fn n_samples(&self) -> usize {
        self.z_mean.nrows()
    }

    fn alpha(&self, m: usize, k: usize) -> f64 {
        self.alpha_shape[m][k] / self.alpha_rate[m][k]
    }

    fn tau(&self, m: usize, d: usize) -> f64 {
        self.tau_shape[m][d] / self.tau_rate[m][d]
    }

    /// Update the weights of every view, one feature at a time.
    pub fn update_weights(&mut self, views: &[DMatrix<f64>]) {
        let k_total = self.n_factors();
        for (m, view) in views.iter().enumerate() {
            let rows: Vec<(Vec<f64>, Vec<f64>)> = (0..view.nrows())
                .into_par_iter()
                .map(|d| {
                    let tau = self.tau(m, d);
                    let mut w: Vec<f64> = self.w_mean[m].row(d).iter().copied().collect();
                    let mut w_var = vec![0.0; k_total];
                    for k in 0..k_total {
                        let mut zz = 0.0;
                        let mut rz = 0.0;
                        for n in 0..view.ncols() {
                            let y = view[(d, n)];
                            if y.is_nan() {
                                continue;
                            }
                            let mut partial = 0.0;
                            for j in 0..k_total {
                                if j != k {
                                    partial += w[j] * self.z_mean[(n, j)];
                                }
                            }
                            let z = self.z_mean[(n, k)];
                            zz += z * z + self.z_var[(n, k)];
                            rz += (y - partial) * z;
                        }
                        let precision = self.alpha(m, k) + tau * zz;
                        w[k] = tau * rz / precision;
                        w_var[k] = 1.0 / precision;
                    }
                    (w, w_var)
                })
                .collect();

            for (d, (mean, var)) in rows.into_iter().enumerate() {
                for k in 0..k_total {
                    self.w_mean[m][(d, k)] = mean[k];
                    self.w_var[m][(d, k)] = var[k];
                }
            }
        }
    }

    /// Update the ARD precisions of every view and factor.
    pub fn update_alpha(&mut self) {
        for m in 0..self.w_mean.len() {
            let n_features = self.w_mean[m].nrows() as f64;
            for k in 0..self.n_factors() {
                let second_moment: f64 = self.w_mean[m]
                    .column(k)
                    .iter()
                    .zip(self.w_var[m].column(k).iter())
                    .map(|(mu, v)| mu * mu + v)
                    .sum();
                self.alpha_shape[m][k] = PRIOR_SHAPE + 0.5 * n_features;
                self.alpha_rate[m][k] = PRIOR_RATE + 0.5 * second_moment;
            }
        }
    }

    /// Update the factors, one sample at a time.
    pub fn update_factors(&mut self, views: &[DMatrix<f64>]) {
        let k_total = self.n_factors();
        let rows: Vec<(Vec<f64>, Vec<f64>)> = (0..self.n_samples())
            .into_par_iter()
            .map(|n| {
                let mut z: Vec<f64> = self.z_mean.row(n).iter().copied().collect();
                let mut z_var = vec![0.0; k_total];
                for k in 0..k_total {
                    let mut precision = 1.0;
                    let mut numerator = 0.0;
                    for (m, view) in views.iter().enumerate() {
                        for d in 0..view.nrows() {
                            let y = view[(d, n)];
                            if y.is_nan() {
                                continue;
                            }
                            let tau = self.tau(m, d);
                            let w = self.w_mean[m][(d, k)];
                            let mut partial = 0.0;
                            for j in 0..k_total {
                                if j != k {
                                    partial += self.w_mean[m][(d, j)] * z[j];
                                }
                            }
                            precision += tau * (w * w + self.w_var[m][(d, k)]);
                            numerator += tau * w * (y - partial);
                        }
                    }
                    z[k] = numerator / precision;
                    z_var[k] = 1.0 / precision;
                }
                (z, z_var)
            })
            .collect();

        for (n, (mean, var)) in rows.into_iter().enumerate() {
            for k in 0..k_total {
                self.z_mean[(n, k)] = mean[k];
                self.z_var[(n, k)] = var[k];
            }
        }
    }

    /// Update the noise precision of every feature.
    pub fn update_tau(&mut self, views: &[DMatrix<f64>]) {
        for (m, view) in views.iter().enumerate() {
            let updates: Vec<(f64, f64)> = (0..view.nrows())
                .into_par_iter()
                .map(|d| {
                    let (n_obs, ss) = self.expected_residual(view, m, d);
                    (PRIOR_SHAPE + 0.5 * n_obs as f64, PRIOR_RATE + 0.5 * ss)
                })
                .collect();
            for (d, (shape, rate)) in updates.into_iter().enumerate() {
                self.tau_shape[m][d] = shape;
                self.tau_rate[m][d] = rate;
            }
        }
    }

    /// Observed count and E[Σ (y - wᵀz)²] over the observed samples of a feature.
    fn expected_residual(&self, view: &DMatrix<f64>, m: usize, d: usize) -> (usize, f64) {
        let k_total = self.n_factors();
        let mut n_obs = 0;
        let mut ss = 0.0;
        for n in 0..view.ncols() {
            let y = view[(d, n)];
            if y.is_nan() {
                continue;
            }
            n_obs += 1;
            let mut fitted = 0.0;
            let mut diag_mean = 0.0;
            let mut diag_second = 0.0;
            for k in 0..k_total {
                let w = self.w_mean[m][(d, k)];
                let z = self.z_mean[(n, k)];
                fitted += w * z;
                diag_mean += w * w * z * z;
                diag_second += (w * w + self.w_var[m][(d, k)]) * (z * z + self.z_var[(n, k)]);
            }
            ss += y * y - 2.0 * y * fitted + fitted * fitted - diag_mean + diag_second;
        }
        (n_obs, ss)
    }

    /// Evidence lower bound of the current state.
    pub fn elbo(&self, views: &[DMatrix<f64>]) -> f64 {
        let mut total = 0.0;

        for (m, view) in views.iter().enumerate() {
            for d in 0..view.nrows() {
                let (n_obs, ss) = self.expected_residual(view, m, d);
                let (shape, rate) = (self.tau_shape[m][d], self.tau_rate[m][d]);
                let e_log_tau = digamma(shape) - rate.ln();
                total += 0.5 * n_obs as f64 * (e_log_tau - LN_2PI) - 0.5 * (shape / rate) * ss;
                total += gamma_bound(shape, rate);
            }

            for k in 0..self.n_factors() {
                let (shape, rate) = (self.alpha_shape[m][k], self.alpha_rate[m][k]);
                let e_log_alpha = digamma(shape) - rate.ln();
                let e_alpha = shape / rate;
                for d in 0..view.nrows() {
                    let mu = self.w_mean[m][(d, k)];
                    let var = self.w_var[m][(d, k)];
                    total += 0.5 * (e_log_alpha - LN_2PI) - 0.5 * e_alpha * (mu * mu + var);
                    total += gaussian_entropy(var);
                }
                total += gamma_bound(shape, rate);
            }
        }

        for (mu, var) in self.z_mean.iter().zip(self.z_var.iter()) {
            total += -0.5 * LN_2PI - 0.5 * (mu * mu + var) + gaussian_entropy(*var);
        }

        total
    }
}

fn gaussian_entropy(var: f64) -> f64 {
    0.5 * (1.0 + LN_2PI + var.ln())
}

/// E[log p(x)] - E[log q(x)] for a Gamma posterior under the Gamma prior.
fn gamma_bound(shape: f64, rate: f64) -> f64 {
    let e_log = digamma(shape) - rate.ln();
    let e_x = shape / rate;
    let log_prior = PRIOR_SHAPE * PRIOR_RATE.ln() - ln_gamma(PRIOR_SHAPE) + (PRIOR_SHAPE - 1.0) * e_log
        - PRIOR_RATE * e_x;
    let log_q = shape * rate.ln() - ln_gamma(shape) + (shape - 1.0) * e_log - rate * e_x;
    log_prior - log_q
}
