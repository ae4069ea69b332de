//! Integration report over a synthetic three-view cohort.
//!
//! Generates a TCGA-shaped dataset, fits sparse block PLS-DA and the factor
//! model, joins the clinical table and renders the standard figures.
//!
//! Run with `cargo run --example report_pipeline [output_dir]`.

use omics_integration::prelude::*;
use std::path::PathBuf;

fn main() -> Result<()> {
    println!("=== Multi-omics Integration Example ===\n");

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("omics_report_example"));
    std::fs::create_dir_all(&output_dir)?;

    let data = generate_synthetic(&SyntheticConfig::tcga_like().with_seed(7))?;
    let manifest = data.write_to_dir(&output_dir.join("data"))?;
    let dataset = load_dataset(&manifest, None)?;

    println!("Dataset: {}", dataset.name);
    println!("  Samples: {}", dataset.assays.n_samples());
    for (name, table) in dataset.assays.iter() {
        println!("  {:<8} {} features", name, table.n_features());
    }
    println!();

    let output = Report::new()
        .name("synthetic_breast")
        .splsda(
            PlsdaConfig::new(2).keep_x(
                KeepX::new()
                    .with("mrna", &[25, 25])
                    .with("mirna", &[20, 20])
                    .with("protein", &[15, 15]),
            ),
        )
        .mofa(FactorOptions {
            num_factors: 5,
            ..Default::default()
        })
        .join_clinical(IdPattern::TcgaParticipant, false)
        .export_clinical("clinical_clean.csv", &["age", "stage"])
        .export_selected_features("selected_features.tsv")
        .plot(
            PlotKind::Individuals {
                block: None,
                comp_x: 0,
                comp_y: 1,
            },
            "individuals.svg",
        )
        .plot(PlotKind::VarianceExplained, "variance_explained.svg")
        .run(&dataset, &output_dir)?;

    let summary = &output.summary;
    if let Some(plsda) = &summary.plsda {
        println!("=== Block sPLS-DA ===\n");
        println!("  Training accuracy: {:.1}%", plsda.training_accuracy * 100.0);
        for (block, counts) in &plsda.selected {
            println!("  {:<8} selected per component: {:?}", block, counts);
        }
        println!();
    }

    if let Some(factor) = &summary.factor {
        println!("=== Factor model ===\n");
        println!("  Factors: {}  Iterations: {}", factor.n_factors, factor.iterations);
        for (view, r2) in &factor.r2_total {
            println!("  {:<8} R² = {:.3}", view, r2);
        }
        println!();
    }

    if let Some(join) = &summary.join {
        println!("=== Clinical join ===\n");
        println!("  Matched: {}  Unmatched: {}", join.matched, join.unmatched.len());
        println!();
    }

    println!("Outputs:");
    for path in &summary.outputs {
        println!("  {}", path.display());
    }
    Ok(())
}
