//! Factor-model plots: variance explained, factor correlation, and factor
//! scores against a clinical covariate.

use super::style::{axis_range, color, diverging, CANVAS, FONT};
use crate::error::{OmicsError, Result};
use crate::join::{CovariateValues, FactorCovariateTable};
use crate::model::FactorModel;
use crate::normalize::column_mean_sd;
use plotters::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One bar of the variance-explained chart.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceBar {
    pub view: String,
    pub view_index: usize,
    pub factor: usize,
    pub r2: f64,
}

/// R² per view and factor, ordered by factor then view.
pub fn variance_bars(model: &FactorModel) -> Vec<VarianceBar> {
    let mut bars = Vec::with_capacity(model.r2.len());
    for k in 0..model.n_factors() {
        for (m, view) in model.view_names.iter().enumerate() {
            bars.push(VarianceBar {
                view: view.clone(),
                view_index: m,
                factor: k,
                r2: model.r2[(m, k)],
            });
        }
    }
    bars
}

/// Grouped bar chart of R² per factor, one bar per view.
pub fn plot_variance_explained<P: AsRef<Path>>(model: &FactorModel, path: P) -> Result<()> {
    let bars = variance_bars(model);
    let n_factors = model.n_factors();
    let n_views = model.view_names.len().max(1);
    let top = bars.iter().map(|b| b.r2).fold(0.0f64, f64::max).max(0.05) * 1.1;
    let names = model.factor_names();

    let root = SVGBackend::new(path.as_ref(), CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(OmicsError::plot)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Variance explained per factor", (FONT, 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..n_factors as f64, 0f64..top)
        .map_err(OmicsError::plot)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_factors)
        .x_label_formatter(&|x| names.get(x.floor() as usize).cloned().unwrap_or_default())
        .y_desc("R²")
        .draw()
        .map_err(OmicsError::plot)?;

    let width = 0.8 / n_views as f64;
    for (m, view) in model.view_names.iter().enumerate() {
        let c = color(m);
        chart
            .draw_series(bars.iter().filter(|b| b.view_index == m).map(|b| {
                let left = b.factor as f64 + 0.1 + m as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, b.r2.max(0.0))], c.filled())
            }))
            .map_err(OmicsError::plot)?
            .label(view.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], c.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(OmicsError::plot)?;

    root.present().map_err(OmicsError::plot)?;
    Ok(())
}

/// Heatmap of pairwise factor correlations.
pub fn plot_factor_correlation<P: AsRef<Path>>(model: &FactorModel, path: P) -> Result<()> {
    let corr = model.factor_correlation();
    let k = corr.nrows();
    if k == 0 {
        return Err(OmicsError::EmptyData("model has no factors".to_string()));
    }
    let names = model.factor_names();

    let root = SVGBackend::new(path.as_ref(), (CANVAS.1, CANVAS.1)).into_drawing_area();
    root.fill(&WHITE).map_err(OmicsError::plot)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Factor correlation", (FONT, 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0..k, 0..k)
        .map_err(OmicsError::plot)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(k)
        .y_labels(k)
        .x_label_formatter(&|x| names.get(*x).cloned().unwrap_or_default())
        .y_label_formatter(&|y| names.get(*y).cloned().unwrap_or_default())
        .draw()
        .map_err(OmicsError::plot)?;

    chart
        .draw_series((0..k).flat_map(|i| {
            let corr = &corr;
            (0..k).map(move |j| Rectangle::new([(i, j), (i + 1, j + 1)], diverging(corr[(i, j)]).filled()))
        }))
        .map_err(OmicsError::plot)?;

    root.present().map_err(OmicsError::plot)?;
    Ok(())
}

/// Display options for factor-versus-covariate plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CovariatePlotOptions {
    /// Point radius in pixels.
    pub dot_size: u32,
    /// Total horizontal jitter of strip points, in group widths.
    pub jitter_width: f64,
    /// Horizontal shift of the strip relative to the violin, in group widths.
    pub dodge: f64,
    /// Seed for the jitter.
    pub seed: u64,
    /// Draw violins behind categorical strips.
    pub violin: bool,
}

impl Default for CovariatePlotOptions {
    fn default() -> Self {
        Self {
            dot_size: 4,
            jitter_width: 0.2,
            dodge: 0.0,
            seed: 0,
            violin: true,
        }
    }
}

/// Outline of one violin: density half-widths along the value axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolinShape {
    pub group: String,
    pub center: f64,
    /// (value, half-width) pairs, half-widths scaled to at most 0.4.
    pub profile: Vec<(f64, f64)>,
}

impl ViolinShape {
    /// Closed outline: right side upwards, then left side downwards.
    pub fn outline(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self.profile.iter().map(|(y, w)| (self.center + w, *y)).collect();
        points.extend(self.profile.iter().rev().map(|(y, w)| (self.center - w, *y)));
        points
    }
}

/// Silverman's rule-of-thumb bandwidth.
pub fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 1.0;
    }
    let (_, sd) = column_mean_sd(values.iter().copied());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
    let spread = if iqr > 0.0 { sd.min(iqr / 1.34) } else { sd };
    let bw = 0.9 * spread * (n as f64).powf(-0.2);
    if bw > 0.0 && bw.is_finite() {
        bw
    } else {
        1.0
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Gaussian kernel density of `values` evaluated on `grid`.
pub fn gaussian_kde(values: &[f64], grid: &[f64], bandwidth: f64) -> Vec<f64> {
    let norm = 1.0 / (values.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|g| {
            values
                .iter()
                .map(|v| (-0.5 * ((g - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect()
}

/// Violin outlines for each group, centered at `index + 0.5`.
pub fn violin_shapes(groups: &[(String, Vec<f64>)], points: usize) -> Vec<ViolinShape> {
    let raw: Vec<(String, f64, Vec<(f64, f64)>)> = groups
        .iter()
        .enumerate()
        .filter(|(_, (_, v))| !v.is_empty())
        .map(|(g, (name, values))| {
            let bw = silverman_bandwidth(values);
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min) - 2.0 * bw;
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 2.0 * bw;
            let steps = points.max(2);
            let grid: Vec<f64> = (0..steps)
                .map(|i| lo + (hi - lo) * i as f64 / (steps - 1) as f64)
                .collect();
            let density = gaussian_kde(values, &grid, bw);
            (name.clone(), g as f64 + 0.5, grid.into_iter().zip(density).collect())
        })
        .collect();

    let peak = raw
        .iter()
        .flat_map(|(_, _, p)| p.iter().map(|(_, d)| *d))
        .fold(0.0f64, f64::max);
    let scale = if peak > 0.0 { 0.4 / peak } else { 0.0 };

    raw.into_iter()
        .map(|(group, center, profile)| ViolinShape {
            group,
            center,
            profile: profile.into_iter().map(|(y, d)| (y, d * scale)).collect(),
        })
        .collect()
}

/// Seeded horizontal offsets in `[-width / 2, width / 2]`.
pub fn jitter_offsets(n: usize, width: f64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let half = width.abs() / 2.0;
    (0..n)
        .map(|_| if half > 0.0 { rng.gen_range(-half..=half) } else { 0.0 })
        .collect()
}

/// Factor score against a covariate.
///
/// Continuous covariates give a scatter (covariate on x, score on y).
/// Categorical covariates give a violin per group with a jittered strip of
/// the individual samples.
pub fn plot_factor_covariate<P: AsRef<Path>>(
    table: &FactorCovariateTable,
    factor: usize,
    options: &CovariatePlotOptions,
    path: P,
) -> Result<()> {
    let scores = table.factor(factor)?;
    let factor_name = table.factor_names.get(factor).cloned().unwrap_or_default();
    let y_range = axis_range(scores.iter().copied(), false);

    let root = SVGBackend::new(path.as_ref(), CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(OmicsError::plot)?;
    let caption = format!("{} by {}", factor_name, table.covariate);
    let dot = options.dot_size as i32;

    match &table.values {
        CovariateValues::Continuous(values) => {
            let x_range = axis_range(values.iter().copied(), false);
            let mut chart = ChartBuilder::on(&root)
                .caption(caption, (FONT, 22))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
                .map_err(OmicsError::plot)?;
            chart
                .configure_mesh()
                .x_desc(table.covariate.as_str())
                .y_desc(factor_name.as_str())
                .draw()
                .map_err(OmicsError::plot)?;
            chart
                .draw_series(
                    values
                        .iter()
                        .zip(&scores)
                        .map(|(x, y)| Circle::new((*x, *y), dot, color(0).filled())),
                )
                .map_err(OmicsError::plot)?;
        }
        CovariateValues::Categorical(labels) => {
            let groups_names = table.groups();
            let groups: Vec<(String, Vec<f64>)> = groups_names
                .iter()
                .map(|g| {
                    let values = labels
                        .iter()
                        .zip(&scores)
                        .filter(|(l, _)| *l == g)
                        .map(|(_, s)| *s)
                        .collect();
                    (g.clone(), values)
                })
                .collect();
            let shapes = if options.violin { violin_shapes(&groups, 100) } else { Vec::new() };
            let violin_range = axis_range(
                shapes.iter().flat_map(|s| s.profile.iter().map(|(y, _)| *y)).chain(scores.iter().copied()),
                false,
            );

            let n_groups = groups.len();
            let mut chart = ChartBuilder::on(&root)
                .caption(caption, (FONT, 22))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(0f64..n_groups as f64, violin_range.0..violin_range.1)
                .map_err(OmicsError::plot)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(n_groups)
                .x_label_formatter(&|x| groups_names.get(x.floor() as usize).cloned().unwrap_or_default())
                .x_desc(table.covariate.as_str())
                .y_desc(factor_name.as_str())
                .draw()
                .map_err(OmicsError::plot)?;

            for (g, shape) in shapes.iter().enumerate() {
                let index = groups_names.iter().position(|n| *n == shape.group).unwrap_or(g);
                chart
                    .draw_series(std::iter::once(Polygon::new(shape.outline(), color(index).mix(0.35).filled())))
                    .map_err(OmicsError::plot)?;
            }

            let jitter = jitter_offsets(scores.len(), options.jitter_width, options.seed);
            chart
                .draw_series(labels.iter().zip(&scores).zip(&jitter).map(|((label, y), dx)| {
                    let g = groups_names.iter().position(|n| n == label).unwrap_or(0);
                    let x = g as f64 + 0.5 + options.dodge + dx;
                    Circle::new((x, *y), dot, color(g).filled())
                }))
                .map_err(OmicsError::plot)?;
        }
    }

    root.present().map_err(OmicsError::plot)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kde_integrates_to_one() {
        let values = [0.0, 0.5, 1.0, 1.5];
        let bw = silverman_bandwidth(&values);
        let grid: Vec<f64> = (0..2001).map(|i| -10.0 + i as f64 * 0.01).collect();
        let density = gaussian_kde(&values, &grid, bw);
        let area: f64 = density.iter().sum::<f64>() * 0.01;
        assert_relative_eq!(area, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_violin_widths_bounded() {
        let groups = vec![
            ("a".to_string(), vec![0.0, 0.1, 0.2, 1.0]),
            ("b".to_string(), vec![2.0, 2.5]),
            ("empty".to_string(), vec![]),
        ];
        let shapes = violin_shapes(&groups, 50);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].center, 1.5);
        let widest = shapes
            .iter()
            .flat_map(|s| s.profile.iter().map(|(_, w)| *w))
            .fold(0.0f64, f64::max);
        assert_relative_eq!(widest, 0.4, epsilon = 1e-12);
        assert_eq!(shapes[0].outline().len(), 100);
    }

    #[test]
    fn test_jitter_is_seeded_and_bounded() {
        let a = jitter_offsets(20, 0.3, 5);
        assert_eq!(a, jitter_offsets(20, 0.3, 5));
        assert_ne!(a, jitter_offsets(20, 0.3, 6));
        assert!(a.iter().all(|d| d.abs() <= 0.15));
        assert!(jitter_offsets(3, 0.0, 1).iter().all(|d| *d == 0.0));
    }

    #[test]
    fn test_single_value_bandwidth() {
        assert_eq!(silverman_bandwidth(&[3.0]), 1.0);
        assert_eq!(silverman_bandwidth(&[2.0, 2.0, 2.0]), 1.0);
    }
}
