//! Loading bar charts for block PLS-DA.

use super::style::{axis_range, color, CANVAS, FONT};
use crate::error::{OmicsError, Result};
use crate::model::PlsdaModel;
use plotters::prelude::*;
use std::path::Path;

/// One bar of a loading plot.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadingBar {
    pub feature_id: String,
    pub loading: f64,
    /// Class with the highest mean for this feature.
    pub class: String,
    pub class_index: usize,
}

/// Bars for one block and component, ranked by |loading|.
///
/// Only non-zero loadings are listed; `top_n` keeps the strongest ones.
pub fn loading_bars(model: &PlsdaModel, block: &str, comp: usize, top_n: Option<usize>) -> Result<Vec<LoadingBar>> {
    let selected = model.selected_features(block, comp)?;
    let fitted = model.block(block)?;

    let mut bars: Vec<LoadingBar> = selected
        .into_iter()
        .map(|f| {
            let means = fitted.class_means.row(f.index);
            let mut best = 0;
            for k in 1..means.len() {
                if means[k] > means[best] {
                    best = k;
                }
            }
            LoadingBar {
                feature_id: f.feature_id,
                loading: f.loading,
                class: model.levels[best].clone(),
                class_index: best,
            }
        })
        .collect();
    if let Some(n) = top_n {
        bars.truncate(n);
    }
    Ok(bars)
}

/// Render a horizontal loading bar chart to an SVG file.
pub fn plot_loadings<P: AsRef<Path>>(
    model: &PlsdaModel,
    block: &str,
    comp: usize,
    top_n: Option<usize>,
    path: P,
) -> Result<()> {
    let bars = loading_bars(model, block, comp, top_n)?;
    if bars.is_empty() {
        return Err(OmicsError::EmptyData(format!("block '{}' has no selected features", block)));
    }
    let n = bars.len();
    let (lo, hi) = axis_range(bars.iter().map(|b| b.loading), true);

    let root = SVGBackend::new(path.as_ref(), CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(OmicsError::plot)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Loadings on component {}, block '{}'", comp + 1, block), (FONT, 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(lo..hi, 0f64..n as f64)
        .map_err(OmicsError::plot)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|y| {
            // Strongest feature at the top.
            let idx = n as isize - 1 - y.floor() as isize;
            if idx >= 0 && (idx as usize) < n {
                bars[idx as usize].feature_id.clone()
            } else {
                String::new()
            }
        })
        .x_desc("Loading")
        .draw()
        .map_err(OmicsError::plot)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            let row = (n - 1 - i) as f64;
            Rectangle::new(
                [(0.0, row + 0.1), (bar.loading, row + 0.9)],
                color(bar.class_index).filled(),
            )
        }))
        .map_err(OmicsError::plot)?;

    for (k, level) in model.levels.iter().enumerate() {
        chart
            .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())
            .map_err(OmicsError::plot)?
            .label(level.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color(k).filled()));
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
