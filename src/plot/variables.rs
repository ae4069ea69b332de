//! Correlation circle of selected features.

use super::style::{color, CANVAS, FONT};
use crate::error::{OmicsError, Result};
use crate::model::PlsdaModel;
use plotters::prelude::*;
use std::f64::consts::PI;
use std::path::Path;

/// Points of a circle of radius `r`, closed.
pub fn circle_path(r: f64, segments: usize) -> Vec<(f64, f64)> {
    (0..=segments)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / segments as f64;
            (r * theta.cos(), r * theta.sin())
        })
        .collect()
}

/// Render the correlation circle, colored by block.
///
/// Guides are drawn at radius 1 and 0.5.
pub fn plot_variables<P: AsRef<Path>>(model: &PlsdaModel, comp_x: usize, comp_y: usize, path: P) -> Result<()> {
    let points = model.correlation_circle(comp_x, comp_y)?;

    let root = SVGBackend::new(path.as_ref(), (CANVAS.1 + 100, CANVAS.1)).into_drawing_area();
    root.fill(&WHITE).map_err(OmicsError::plot)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation circle", (FONT, 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-1.1f64..1.1f64, -1.1f64..1.1f64)
        .map_err(OmicsError::plot)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(format!("Component {}", comp_x + 1))
        .y_desc(format!("Component {}", comp_y + 1))
        .draw()
        .map_err(OmicsError::plot)?;

    for r in [1.0, 0.5] {
        chart
            .draw_series(LineSeries::new(circle_path(r, 180), &BLACK.mix(0.6)))
            .map_err(OmicsError::plot)?;
    }
    chart
        .draw_series(std::iter::once(PathElement::new(vec![(-1.0, 0.0), (1.0, 0.0)], &BLACK.mix(0.3))))
        .map_err(OmicsError::plot)?;
    chart
        .draw_series(std::iter::once(PathElement::new(vec![(0.0, -1.0), (0.0, 1.0)], &BLACK.mix(0.3))))
        .map_err(OmicsError::plot)?;

    for (j, name) in model.block_names().into_iter().enumerate() {
        let c = color(j);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.block == name)
                    .map(|p| Circle::new((p.x, p.y), 4, c.filled())),
            )
            .map_err(OmicsError::plot)?
            .label(name)
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, c.filled()));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_path_radius() {
        let path = circle_path(0.5, 36);
        assert_eq!(path.len(), 37);
        for (x, y) in path {
            assert!(((x * x + y * y).sqrt() - 0.5).abs() < 1e-12);
        }
    }
}
