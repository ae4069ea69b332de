//! Stateless SVG renderers for fitted models.
//!
//! Each renderer writes one file and returns `Result<()>`. The data behind
//! every plot is computed by a separate function so it can be checked
//! without drawing.

mod factors;
mod individuals;
mod loadings;
pub mod style;
mod variables;

pub use factors::{
    gaussian_kde, jitter_offsets, plot_factor_correlation, plot_factor_covariate,
    plot_variance_explained, silverman_bandwidth, variance_bars, violin_shapes,
    CovariatePlotOptions, VarianceBar, ViolinShape,
};
pub use individuals::{individual_points, plot_individuals, IndividualPoint};
pub use loadings::{loading_bars, plot_loadings, LoadingBar};
pub use variables::{circle_path, plot_variables};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AssayTable, Metadata, MultiAssay, Outcome, SampleIdPattern};
    use crate::join::{join_clinical, FactorCovariateTable};
    use crate::model::{block_splsda, FactorModel, FactorOptions, KeepX, PlsdaModel};
    use nalgebra::DMatrix;
    use std::path::Path;
    use tempfile::TempDir;

    fn ids() -> Vec<String> {
        (1..=8).map(|i| format!("S{}", i)).collect()
    }

    fn plsda() -> PlsdaModel {
        let make = |p: usize| {
            let rows: Vec<Vec<f64>> = (0..8)
                .map(|i| {
                    let shift = if i % 2 == 0 { 1.0 } else { -1.0 };
                    (0..p)
                        .map(|j| shift * (j + 1) as f64 * 0.5 + ((i * 5 + j * 3) % 7) as f64 * 0.2)
                        .collect()
                })
                .collect();
            AssayTable::from_rows(&rows, ids(), (0..p).map(|j| format!("f{}", j)).collect()).unwrap()
        };
        let assays = MultiAssay::new(vec![("rna".to_string(), make(5)), ("mirna".to_string(), make(3))]).unwrap();
        let labels = (0..8).map(|i| if i % 2 == 0 { "LumA" } else { "Basal" }.to_string()).collect();
        let outcome = Outcome::categorical(ids(), labels).unwrap();
        let keep = KeepX::new().with("rna", &[3, 2]);
        block_splsda(&assays, &outcome, 2, keep).unwrap()
    }

    fn factor_model() -> FactorModel {
        FactorModel {
            view_names: vec!["rna".to_string(), "mirna".to_string()],
            sample_ids: ids(),
            feature_ids: vec![vec!["g".to_string()], vec!["m".to_string()]],
            scores: DMatrix::from_fn(8, 2, |i, k| (i as f64 - 3.5) * (k as f64 + 1.0) * 0.3),
            weights: vec![DMatrix::zeros(1, 2), DMatrix::zeros(1, 2)],
            r2: DMatrix::from_row_slice(2, 2, &[0.3, 0.1, 0.2, 0.05]),
            r2_total: vec![0.4, 0.25],
            elbo: vec![-10.0],
            iterations: 1,
            converged: true,
            view_scales: vec![1.0, 1.0],
            options: FactorOptions::default(),
        }
    }

    fn assert_svg(path: &Path) {
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("<svg"), "{} is not an SVG", path.display());
    }

    #[test]
    fn test_loading_bars_ranked_and_trimmed() {
        let model = plsda();
        let bars = loading_bars(&model, "rna", 0, None).unwrap();
        assert_eq!(bars.len(), 3);
        assert!(bars[0].loading.abs() >= bars[1].loading.abs());
        assert!(model.levels.contains(&bars[0].class));
        assert_eq!(loading_bars(&model, "rna", 0, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_individual_points() {
        let model = plsda();
        let points = individual_points(&model, None, 0, 1).unwrap();
        assert_eq!(points.len(), 8);
        assert_eq!(points[0].x, model.averaged_variates[(0, 0)]);
        assert!(individual_points(&model, Some("protein"), 0, 1).is_err());
    }

    #[test]
    fn test_variance_bars_order() {
        let bars = variance_bars(&factor_model());
        assert_eq!(bars.len(), 4);
        assert_eq!((bars[1].view.as_str(), bars[1].factor, bars[1].r2), ("mirna", 0, 0.2));
    }

    #[test]
    fn test_renderers_write_svg() {
        let dir = TempDir::new().unwrap();
        let model = plsda();
        let factors = factor_model();

        let loadings = dir.path().join("loadings.svg");
        plot_loadings(&model, "rna", 0, Some(10), &loadings).unwrap();
        assert_svg(&loadings);

        let individuals = dir.path().join("individuals.svg");
        plot_individuals(&model, Some("mirna"), 0, 1, &individuals).unwrap();
        assert_svg(&individuals);

        let variables = dir.path().join("variables.svg");
        plot_variables(&model, 0, 1, &variables).unwrap();
        assert_svg(&variables);

        let variance = dir.path().join("variance.svg");
        plot_variance_explained(&factors, &variance).unwrap();
        assert_svg(&variance);

        let correlation = dir.path().join("correlation.svg");
        plot_factor_correlation(&factors, &correlation).unwrap();
        assert_svg(&correlation);
    }

    #[test]
    fn test_covariate_plots_write_svg() {
        let dir = TempDir::new().unwrap();
        let factors = factor_model();
        let records = ids()
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let age = (40 + i * 3).to_string();
                let group = if i < 4 { "early" } else { "late" }.to_string();
                (id, vec![age, group])
            })
            .collect();
        let clinical = Metadata::from_records(vec!["age".to_string(), "stage".to_string()], records).unwrap();
        let join = join_clinical(&factors.sample_ids, &clinical, &SampleIdPattern::identity());

        let continuous = FactorCovariateTable::build(&factors, &join, "age").unwrap();
        let scatter = dir.path().join("age.svg");
        plot_factor_covariate(&continuous, 0, &CovariatePlotOptions::default(), &scatter).unwrap();
        assert_svg(&scatter);

        let categorical = FactorCovariateTable::build(&factors, &join, "stage").unwrap();
        let violin = dir.path().join("stage.svg");
        let options = CovariatePlotOptions {
            dot_size: 3,
            jitter_width: 0.3,
            dodge: 0.1,
            seed: 7,
            violin: true,
        };
        plot_factor_covariate(&categorical, 1, &options, &violin).unwrap();
        assert_svg(&violin);
    }
}
