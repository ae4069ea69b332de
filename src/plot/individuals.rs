//! Sample scatter plots on two components.

use super::style::{axis_range, color, CANVAS, FONT};
use crate::error::{OmicsError, Result};
use crate::model::PlsdaModel;
use plotters::prelude::*;
use std::path::Path;

/// One sample on a component pair.
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualPoint {
    pub sample_id: String,
    pub x: f64,
    pub y: f64,
    pub class: String,
    pub class_index: usize,
}

/// Sample coordinates from one block, or from the averaged variates.
pub fn individual_points(
    model: &PlsdaModel,
    block: Option<&str>,
    comp_x: usize,
    comp_y: usize,
) -> Result<Vec<IndividualPoint>> {
    model.check_component(comp_x)?;
    model.check_component(comp_y)?;
    let variates = model.variates(block)?;

    Ok(model
        .sample_ids
        .iter()
        .zip(&model.labels)
        .enumerate()
        .map(|(i, (sample_id, label))| IndividualPoint {
            sample_id: sample_id.clone(),
            x: variates[(i, comp_x)],
            y: variates[(i, comp_y)],
            class: label.clone(),
            class_index: model.levels.iter().position(|l| l == label).unwrap_or(0),
        })
        .collect())
}

/// Render the sample scatter, colored by class.
pub fn plot_individuals<P: AsRef<Path>>(
    model: &PlsdaModel,
    block: Option<&str>,
    comp_x: usize,
    comp_y: usize,
    path: P,
) -> Result<()> {
    let points = individual_points(model, block, comp_x, comp_y)?;
    let x_range = axis_range(points.iter().map(|p| p.x), true);
    let y_range = axis_range(points.iter().map(|p| p.y), true);
    let title = match block {
        Some(name) => format!("Samples, block '{}'", name),
        None => "Samples, averaged variates".to_string(),
    };

    let root = SVGBackend::new(path.as_ref(), CANVAS).into_drawing_area();
    root.fill(&WHITE).map_err(OmicsError::plot)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .map_err(OmicsError::plot)?;

    chart
        .configure_mesh()
        .x_desc(format!("Component {}", comp_x + 1))
        .y_desc(format!("Component {}", comp_y + 1))
        .draw()
        .map_err(OmicsError::plot)?;

    for (k, level) in model.levels.iter().enumerate() {
        let c = color(k);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.class_index == k)
                    .map(|p| Circle::new((p.x, p.y), 5, c.filled())),
            )
            .map_err(OmicsError::plot)?
            .label(level.as_str())
            .legend(move |(x, y)| Circle::new((x + 5, y), 5, c.filled()));
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
