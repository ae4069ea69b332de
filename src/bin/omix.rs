//! omix - multi-omics integration CLI
//!
//! Command-line interface for block PLS-DA, multi-view factor analysis and
//! clinical joins over a dataset manifest.

use clap::{Parser, Subcommand, ValueEnum};
use omics_integration::data::{load_dataset, LoadedDataset};
use omics_integration::error::{OmicsError, Result};
use omics_integration::join::join_clinical;
use omics_integration::model::{fit_block_plsda, fit_factor_model, ConvergenceMode, FactorOptions, KeepX, PlsdaConfig};
use omics_integration::persist;
use omics_integration::plot::{plot_individuals, plot_variables, plot_variance_explained, plot_factor_correlation};
use omics_integration::report::{run_report, IdPattern, ReportConfig};
use omics_integration::synthetic::{generate_synthetic, SyntheticConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI-friendly convergence mode enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliConvergence {
    Fast,
    Medium,
    Slow,
}

impl From<CliConvergence> for ConvergenceMode {
    fn from(mode: CliConvergence) -> Self {
        match mode {
            CliConvergence::Fast => ConvergenceMode::Fast,
            CliConvergence::Medium => ConvergenceMode::Medium,
            CliConvergence::Slow => ConvergenceMode::Slow,
        }
    }
}

/// CLI-friendly sample-ID normalization
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPattern {
    /// Trim only
    Identity,
    /// TCGA participant code
    Tcga,
    /// Last token after --separator
    Suffix,
}

/// Synthetic dataset presets
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPreset {
    /// Two classes, three tiny blocks
    Small,
    /// Three subtypes with TCGA breast-cancer block widths
    Tcga,
}

/// Multi-omics integration
#[derive(Parser)]
#[command(name = "omix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a report from a YAML configuration file
    Run {
        /// Path to report configuration YAML
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Fit block (s)PLS-DA on a dataset
    Diablo {
        /// Dataset manifest YAML
        #[arg(short, long)]
        manifest: PathBuf,

        /// Number of components
        #[arg(short, long, default_value = "2")]
        ncomp: usize,

        /// Keep counts per block, e.g. `mrna=25,25` (repeatable)
        #[arg(short, long, value_parser = parse_keep)]
        keep: Vec<(String, Vec<usize>)>,

        /// Link weight between assay blocks
        #[arg(long, default_value = "0.1")]
        design_weight: f64,

        /// Output directory
        #[arg(short, long, default_value = "diablo")]
        output: PathBuf,
    },

    /// Fit the multi-view factor model on a dataset
    Mofa {
        /// Dataset manifest YAML
        #[arg(short, long)]
        manifest: PathBuf,

        /// Number of factors
        #[arg(short, long, default_value = "10")]
        factors: usize,

        /// Convergence mode
        #[arg(long, value_enum, default_value = "fast")]
        mode: CliConvergence,

        /// Maximum iterations
        #[arg(long, default_value = "1000")]
        max_iter: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Scale each view to unit overall variance
        #[arg(long)]
        scale_views: bool,

        /// Output directory
        #[arg(short, long, default_value = "mofa")]
        output: PathBuf,
    },

    /// Join assay samples with the clinical table and export the cleaned subset
    Join {
        /// Dataset manifest YAML
        #[arg(short, long)]
        manifest: PathBuf,

        /// Sample-ID normalization
        #[arg(short, long, value_enum, default_value = "tcga")]
        pattern: CliPattern,

        /// Separator for `--pattern suffix`
        #[arg(long, default_value = "-")]
        separator: char,

        /// Custom regex with one capture group (overrides --pattern)
        #[arg(long)]
        regex: Option<String>,

        /// Columns to export (all if omitted)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Output CSV
        #[arg(short, long, default_value = "clinical_clean.csv")]
        output: PathBuf,
    },

    /// Write a synthetic dataset with a manifest
    Synthetic {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Preset
        #[arg(short, long, value_enum, default_value = "small")]
        preset: CliPreset,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Fraction of missing cells
        #[arg(long, default_value = "0.0")]
        missing: f64,
    },

    /// Write an example report configuration
    Example {
        /// Output path for YAML
        #[arg(short, long, default_value = "report.yaml")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config } => cmd_run(&config),

        Commands::Diablo {
            manifest,
            ncomp,
            keep,
            design_weight,
            output,
        } => cmd_diablo(&manifest, ncomp, keep, design_weight, &output),

        Commands::Mofa {
            manifest,
            factors,
            mode,
            max_iter,
            seed,
            scale_views,
            output,
        } => cmd_mofa(&manifest, factors, mode, max_iter, seed, scale_views, &output),

        Commands::Join {
            manifest,
            pattern,
            separator,
            regex,
            columns,
            output,
        } => cmd_join(&manifest, pattern, separator, regex, &columns, &output),

        Commands::Synthetic {
            output,
            preset,
            seed,
            missing,
        } => cmd_synthetic(&output, preset, seed, missing),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Parse `block=k1,k2,...`.
fn parse_keep(s: &str) -> std::result::Result<(String, Vec<usize>), String> {
    let (block, counts) = s
        .split_once('=')
        .ok_or_else(|| format!("expected BLOCK=K1,K2,... but got '{}'", s))?;
    let counts = counts
        .split(',')
        .map(|c| c.trim().parse::<usize>().map_err(|e| format!("bad keep count '{}': {}", c, e)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((block.trim().to_string(), counts))
}

fn load(manifest: &Path) -> Result<LoadedDataset> {
    let dataset = load_dataset(manifest, None)?;
    info!(
        dataset = %dataset.name,
        samples = dataset.assays.n_samples(),
        blocks = dataset.assays.n_blocks(),
        "Loaded dataset"
    );
    Ok(dataset)
}

fn cmd_run(config_path: &Path) -> Result<()> {
    info!(config = %config_path.display(), "Loading report configuration");
    let config = ReportConfig::from_file(config_path)?;
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let output = run_report(&config, base)?;

    println!("Report '{}' finished", output.summary.name);
    for path in &output.summary.outputs {
        println!("  {}", path.display());
    }
    Ok(())
}

fn cmd_diablo(
    manifest: &Path,
    ncomp: usize,
    keep: Vec<(String, Vec<usize>)>,
    design_weight: f64,
    output: &Path,
) -> Result<()> {
    let dataset = load(manifest)?;
    let outcome = dataset
        .outcome
        .as_ref()
        .ok_or_else(|| OmicsError::InvalidParameter("manifest declares no outcome".to_string()))?;

    let keep_x = keep
        .iter()
        .fold(KeepX::new(), |acc, (block, counts)| acc.with(block, counts));
    let config = PlsdaConfig::new(ncomp).keep_x(keep_x).design_weight(design_weight);
    let model = fit_block_plsda(&dataset.assays, outcome, &config)?;

    std::fs::create_dir_all(output)?;
    persist::save_plsda_model(output.join("plsda_model.json"), &model)?;
    persist::write_selected_features(output.join("selected_features.tsv"), &model)?;
    if ncomp >= 2 {
        plot_individuals(&model, None, 0, 1, output.join("individuals.svg"))?;
        plot_variables(&model, 0, 1, output.join("variables.svg"))?;
    }

    let accuracy = model.predict(&dataset.assays)?.accuracy(&model.labels);
    println!("Block {}PLS-DA, {} components", if model.sparse { "s" } else { "" }, model.ncomp);
    for block in &model.blocks {
        let selected: Vec<String> = (0..model.ncomp).map(|c| block.n_selected(c).to_string()).collect();
        println!("  {:<12} selected per component: {}", block.name, selected.join(", "));
    }
    println!("  Training accuracy: {:.1}%", accuracy * 100.0);
    println!("Outputs written to {}", output.display());
    Ok(())
}

fn cmd_mofa(
    manifest: &Path,
    factors: usize,
    mode: CliConvergence,
    max_iter: usize,
    seed: u64,
    scale_views: bool,
    output: &Path,
) -> Result<()> {
    let dataset = load(manifest)?;
    std::fs::create_dir_all(output)?;

    let options = FactorOptions {
        scale_views,
        num_factors: factors,
        convergence_mode: mode.into(),
        max_iter,
        seed,
        training_output: Some(output.join("training.bin")),
        ..Default::default()
    };
    let model = fit_factor_model(&dataset.assays, &options)?;

    persist::save_factor_model(output.join("factor_model.json"), &model)?;
    persist::write_factor_scores(output.join("factor_scores.tsv"), &model)?;
    plot_variance_explained(&model, output.join("variance_explained.svg"))?;
    plot_factor_correlation(&model, output.join("factor_correlation.svg"))?;

    println!("Factor model: {} factors, {} iterations", model.n_factors(), model.iterations);
    for (view, r2) in model.view_names.iter().zip(&model.r2_total) {
        println!("  {:<12} R² total: {:.3}", view, r2);
    }
    println!("Outputs written to {}", output.display());
    Ok(())
}

fn cmd_join(
    manifest: &Path,
    pattern: CliPattern,
    separator: char,
    regex: Option<String>,
    columns: &[String],
    output: &Path,
) -> Result<()> {
    let dataset = load(manifest)?;
    let clinical = dataset
        .clinical
        .as_ref()
        .ok_or_else(|| OmicsError::InvalidParameter("manifest declares no clinical table".to_string()))?;

    let pattern = match (regex, pattern) {
        (Some(pattern), _) => IdPattern::Regex { pattern },
        (None, CliPattern::Identity) => IdPattern::Identity,
        (None, CliPattern::Tcga) => IdPattern::TcgaParticipant,
        (None, CliPattern::Suffix) => IdPattern::SuffixAfter { separator },
    };
    let join = join_clinical(dataset.assays.sample_ids(), clinical, &pattern.compile()?);
    let cleaned = join.cleaned(columns)?;
    persist::write_clinical_csv(output, &cleaned)?;

    println!("Matched {} of {} samples", join.n_matched(), dataset.assays.n_samples());
    let unmatched = join.unmatched();
    if !unmatched.is_empty() {
        println!("  Unmatched: {}", unmatched.join(", "));
    }
    let ambiguous = join.ambiguous();
    if !ambiguous.is_empty() {
        println!("  Ambiguous: {}", ambiguous.join(", "));
    }
    let sharing = join.sharing_samples();
    if !sharing.is_empty() {
        println!("  Sharing a key: {}", sharing.join(", "));
    }
    println!("Wrote {} rows to {}", cleaned.len(), output.display());
    Ok(())
}

fn cmd_synthetic(output: &Path, preset: CliPreset, seed: u64, missing: f64) -> Result<()> {
    let config = match preset {
        CliPreset::Small => SyntheticConfig::small(),
        CliPreset::Tcga => SyntheticConfig::tcga_like(),
    }
    .with_seed(seed)
    .with_missing(missing);

    let data = generate_synthetic(&config)?;
    let manifest = data.write_to_dir(output)?;
    println!("Wrote synthetic dataset '{}' ({} samples)", config.name, data.assays.n_samples());
    println!("  Manifest: {}", manifest.display());
    Ok(())
}

fn cmd_example(output: &Path) -> Result<()> {
    let yaml = ReportConfig::example().to_yaml()?;
    std::fs::write(output, yaml)?;
    println!("Wrote example report configuration to {}", output.display());
    Ok(())
}
