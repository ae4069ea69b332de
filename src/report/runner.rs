//! Report runner for composing and executing integration steps.

use crate::data::{load_dataset, LoadedDataset, SampleIdPattern};
use crate::error::{OmicsError, Result};
use crate::join::{join_clinical, ClinicalJoin, FactorCovariateTable};
use crate::model::{fit_block_plsda, fit_factor_model, FactorModel, FactorOptions, PlsdaConfig, PlsdaModel};
use crate::persist;
use crate::plot::{
    plot_factor_correlation, plot_factor_covariate, plot_individuals, plot_loadings,
    plot_variables, plot_variance_explained, CovariatePlotOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sample-ID normalization used when joining clinical rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum IdPattern {
    /// Trim only.
    #[default]
    Identity,
    /// Participant code of a TCGA barcode.
    TcgaParticipant,
    /// Last token after a separator.
    SuffixAfter { separator: char },
    /// Custom regex with one capture group.
    Regex { pattern: String },
}

impl IdPattern {
    /// Build the matcher.
    pub fn compile(&self) -> Result<SampleIdPattern> {
        match self {
            IdPattern::Identity => Ok(SampleIdPattern::identity()),
            IdPattern::TcgaParticipant => Ok(SampleIdPattern::tcga_participant()),
            IdPattern::SuffixAfter { separator } => SampleIdPattern::suffix_after(*separator),
            IdPattern::Regex { pattern } => SampleIdPattern::new(pattern),
        }
    }
}

/// One rendered figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlotKind {
    /// Loadings of one block and component.
    Loadings {
        block: String,
        component: usize,
        top_n: Option<usize>,
    },
    /// Samples on two components; `block: None` uses the averaged variates.
    Individuals {
        block: Option<String>,
        comp_x: usize,
        comp_y: usize,
    },
    /// Correlation circle.
    Variables { comp_x: usize, comp_y: usize },
    /// R² per view and factor.
    VarianceExplained,
    /// Factor correlation heatmap.
    FactorCorrelation,
    /// Factor scores against a clinical covariate.
    FactorCovariate {
        factor: usize,
        covariate: String,
        #[serde(default)]
        options: CovariatePlotOptions,
    },
}

/// A step in the integration report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportStep {
    // === Models ===
    /// Fit block (s)PLS-DA against the dataset outcome.
    Diablo { config: PlsdaConfig },
    /// Fit the multi-view factor model.
    Mofa { options: FactorOptions },

    // === Clinical join ===
    /// Join analysis samples with the clinical table.
    JoinClinical {
        #[serde(default)]
        pattern: IdPattern,
        /// Fail when a sample is unmatched or ambiguous.
        #[serde(default)]
        strict: bool,
    },

    // === Exports ===
    /// Cleaned clinical subset as CSV. Empty `columns` exports every column.
    ExportClinical {
        path: PathBuf,
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Fitted factor model as JSON.
    SaveFactorModel { path: PathBuf },
    /// Fitted PLS-DA model as JSON.
    SavePlsdaModel { path: PathBuf },
    /// Factor scores as TSV.
    ExportFactorScores { path: PathBuf },
    /// Selected features of every block and component as TSV.
    ExportSelectedFeatures { path: PathBuf },

    // === Plots ===
    /// Render one SVG figure.
    Plot { kind: PlotKind, path: PathBuf },
}

impl ReportStep {
    /// Short name for logs and errors.
    pub fn label(&self) -> &'static str {
        match self {
            ReportStep::Diablo { .. } => "diablo",
            ReportStep::Mofa { .. } => "mofa",
            ReportStep::JoinClinical { .. } => "join_clinical",
            ReportStep::ExportClinical { .. } => "export_clinical",
            ReportStep::SaveFactorModel { .. } => "save_factor_model",
            ReportStep::SavePlsdaModel { .. } => "save_plsda_model",
            ReportStep::ExportFactorScores { .. } => "export_factor_scores",
            ReportStep::ExportSelectedFeatures { .. } => "export_selected_features",
            ReportStep::Plot { .. } => "plot",
        }
    }
}

/// Report configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Name of the report.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Dataset manifest, relative to the config file.
    pub dataset: PathBuf,
    /// Directory receiving every output, relative to the config file.
    pub output_dir: PathBuf,
    /// Steps to execute.
    pub steps: Vec<ReportStep>,
}

impl ReportConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(OmicsError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(OmicsError::from)
    }

    /// Read a config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// A complete report over a TCGA-style manifest.
    pub fn example() -> Self {
        let report = Report::new()
            .name("breast_tcga")
            .splsda(
                PlsdaConfig::new(2).keep_x(
                    crate::model::KeepX::new()
                        .with("mrna", &[25, 25])
                        .with("mirna", &[20, 20])
                        .with("protein", &[15, 15]),
                ),
            )
            .mofa(FactorOptions {
                num_factors: 5,
                training_output: Some(PathBuf::from("mofa_training.bin")),
                ..Default::default()
            })
            .join_clinical(IdPattern::TcgaParticipant, false)
            .export_clinical("clinical_clean.csv", &[])
            .save_factor_model("factor_model.json")
            .export_selected_features("selected_features.tsv")
            .plot(
                PlotKind::Loadings {
                    block: "mrna".to_string(),
                    component: 0,
                    top_n: Some(20),
                },
                "loadings_mrna_comp1.svg",
            )
            .plot(
                PlotKind::Individuals {
                    block: None,
                    comp_x: 0,
                    comp_y: 1,
                },
                "individuals.svg",
            )
            .plot(PlotKind::Variables { comp_x: 0, comp_y: 1 }, "variables.svg")
            .plot(PlotKind::VarianceExplained, "variance_explained.svg")
            .plot(PlotKind::FactorCorrelation, "factor_correlation.svg")
            .plot(
                PlotKind::FactorCovariate {
                    factor: 0,
                    covariate: "age".to_string(),
                    options: CovariatePlotOptions::default(),
                },
                "factor1_age.svg",
            )
            .plot(
                PlotKind::FactorCovariate {
                    factor: 0,
                    covariate: "stage".to_string(),
                    options: CovariatePlotOptions::default(),
                },
                "factor1_stage.svg",
            );
        report.to_config(
            Some("Block sPLS-DA and factor analysis of a three-assay cohort"),
            "manifest.yaml",
            "report",
        )
    }
}

/// Builder for constructing and running integration reports.
#[derive(Debug, Clone)]
pub struct Report {
    steps: Vec<ReportStep>,
    name: String,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Set the report name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[ReportStep] {
        &self.steps
    }

    /// Add non-sparse block PLS-DA.
    pub fn diablo(mut self, ncomp: usize) -> Self {
        self.steps.push(ReportStep::Diablo {
            config: PlsdaConfig::new(ncomp),
        });
        self
    }

    /// Add block PLS-DA with a full configuration (sparse when it carries keep counts).
    pub fn splsda(mut self, config: PlsdaConfig) -> Self {
        self.steps.push(ReportStep::Diablo { config });
        self
    }

    /// Add the factor model.
    pub fn mofa(mut self, options: FactorOptions) -> Self {
        self.steps.push(ReportStep::Mofa { options });
        self
    }

    /// Add the clinical join.
    pub fn join_clinical(mut self, pattern: IdPattern, strict: bool) -> Self {
        self.steps.push(ReportStep::JoinClinical { pattern, strict });
        self
    }

    /// Export the cleaned clinical subset.
    pub fn export_clinical(mut self, path: &str, columns: &[&str]) -> Self {
        self.steps.push(ReportStep::ExportClinical {
            path: PathBuf::from(path),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Persist the factor model.
    pub fn save_factor_model(mut self, path: &str) -> Self {
        self.steps.push(ReportStep::SaveFactorModel { path: PathBuf::from(path) });
        self
    }

    /// Persist the PLS-DA model.
    pub fn save_plsda_model(mut self, path: &str) -> Self {
        self.steps.push(ReportStep::SavePlsdaModel { path: PathBuf::from(path) });
        self
    }

    /// Export factor scores.
    pub fn export_factor_scores(mut self, path: &str) -> Self {
        self.steps.push(ReportStep::ExportFactorScores { path: PathBuf::from(path) });
        self
    }

    /// Export selected features.
    pub fn export_selected_features(mut self, path: &str) -> Self {
        self.steps.push(ReportStep::ExportSelectedFeatures { path: PathBuf::from(path) });
        self
    }

    /// Render a figure.
    pub fn plot(mut self, kind: PlotKind, path: &str) -> Self {
        self.steps.push(ReportStep::Plot {
            kind,
            path: PathBuf::from(path),
        });
        self
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>, dataset: &str, output_dir: &str) -> ReportConfig {
        ReportConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            dataset: PathBuf::from(dataset),
            output_dir: PathBuf::from(output_dir),
            steps: self.steps.clone(),
        }
    }

    /// Run every step on a loaded dataset, writing outputs under `output_dir`.
    pub fn run(&self, dataset: &LoadedDataset, output_dir: &Path) -> Result<ReportOutput> {
        fs::create_dir_all(output_dir)?;
        info!(report = %self.name, dataset = %dataset.name, steps = self.steps.len(), "Starting report");

        let mut state = ReportState::new(dataset, output_dir);
        for (i, step) in self.steps.iter().enumerate() {
            info!(step = i + 1, kind = step.label(), "Running step");
            state = state.apply(step).map_err(|e| {
                OmicsError::Report(format!("Step {} ({}) failed: {}", i + 1, step.label(), e))
            })?;
        }

        state.finalize(&self.name)
    }
}

/// Load the config's dataset, run the report, and write `summary.json`.
///
/// Relative dataset and output paths resolve against `base`.
pub fn run_report(config: &ReportConfig, base: &Path) -> Result<ReportOutput> {
    let dataset = load_dataset(base.join(&config.dataset), None)?;
    let output_dir = base.join(&config.output_dir);
    let output = Report::from_config(config).run(&dataset, &output_dir)?;
    let summary_path = output_dir.join("summary.json");
    persist::write_json(&summary_path, &output.summary)?;
    info!(path = %summary_path.display(), "Wrote report summary");
    Ok(output)
}

/// Per-block shape in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub name: String,
    pub n_features: usize,
    pub n_missing: usize,
}

/// Discriminant-model digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlsdaSummary {
    pub ncomp: usize,
    pub sparse: bool,
    pub iterations: Vec<usize>,
    pub converged: Vec<bool>,
    /// Non-zero loadings per block per component.
    pub selected: BTreeMap<String, Vec<usize>>,
    pub training_accuracy: f64,
}

/// Factor-model digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSummary {
    pub n_factors: usize,
    pub iterations: usize,
    pub final_elbo: f64,
    pub r2_total: BTreeMap<String, f64>,
}

/// Clinical-join digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSummary {
    pub matched: usize,
    pub unmatched: Vec<String>,
    pub ambiguous: Vec<String>,
    /// Samples whose key is also produced by another sample.
    #[serde(default)]
    pub shared: Vec<String>,
    pub keys_unique: bool,
}

/// JSON summary of one report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub name: String,
    pub dataset: String,
    pub generated: String,
    pub n_samples: usize,
    pub blocks: Vec<BlockSummary>,
    pub plsda: Option<PlsdaSummary>,
    pub factor: Option<FactorSummary>,
    pub join: Option<JoinSummary>,
    /// Files written, in step order.
    pub outputs: Vec<PathBuf>,
}

/// Everything a report run produced.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub summary: ReportSummary,
    pub plsda: Option<PlsdaModel>,
    pub factor: Option<FactorModel>,
    pub join: Option<ClinicalJoin>,
}

/// Internal state during report execution.
struct ReportState<'a> {
    dataset: &'a LoadedDataset,
    output_dir: &'a Path,
    plsda: Option<PlsdaModel>,
    factor: Option<FactorModel>,
    join: Option<ClinicalJoin>,
    outputs: Vec<PathBuf>,
}

impl<'a> ReportState<'a> {
    fn new(dataset: &'a LoadedDataset, output_dir: &'a Path) -> Self {
        Self {
            dataset,
            output_dir,
            plsda: None,
            factor: None,
            join: None,
            outputs: Vec::new(),
        }
    }

    fn output(&mut self, path: &Path) -> PathBuf {
        let full = self.output_dir.join(path);
        self.outputs.push(full.clone());
        full
    }

    fn plsda(&self) -> Result<&PlsdaModel> {
        self.plsda
            .as_ref()
            .ok_or_else(|| OmicsError::Report("Must fit the discriminant model first".to_string()))
    }

    fn factor(&self) -> Result<&FactorModel> {
        self.factor
            .as_ref()
            .ok_or_else(|| OmicsError::Report("Must fit the factor model first".to_string()))
    }

    fn join(&self) -> Result<&ClinicalJoin> {
        self.join
            .as_ref()
            .ok_or_else(|| OmicsError::Report("Must join clinical data first".to_string()))
    }

    fn apply(mut self, step: &ReportStep) -> Result<Self> {
        match step {
            // === Models ===
            ReportStep::Diablo { config } => {
                let outcome = self.dataset.outcome.as_ref().ok_or_else(|| {
                    OmicsError::Report("Dataset has no outcome for discriminant analysis".to_string())
                })?;
                self.plsda = Some(fit_block_plsda(&self.dataset.assays, outcome, config)?);
            }
            ReportStep::Mofa { options } => {
                let mut options = options.clone();
                if let Some(path) = options.training_output.take() {
                    options.training_output = Some(self.output(&path));
                }
                self.factor = Some(fit_factor_model(&self.dataset.assays, &options)?);
            }

            // === Clinical join ===
            ReportStep::JoinClinical { pattern, strict } => {
                let clinical = self.dataset.clinical.as_ref().ok_or_else(|| {
                    OmicsError::Report("Dataset has no clinical table".to_string())
                })?;
                let join = join_clinical(self.dataset.assays.sample_ids(), clinical, &pattern.compile()?);
                if *strict && !(join.all_matched() && join.keys_unique()) {
                    return Err(OmicsError::SampleMismatch(format!(
                        "{} unmatched, {} ambiguous and {} sharing a key",
                        join.unmatched().len(),
                        join.ambiguous().len(),
                        join.sharing_samples().len()
                    )));
                }
                self.join = Some(join);
            }

            // === Exports ===
            ReportStep::ExportClinical { path, columns } => {
                let cleaned = self.join()?.cleaned(columns)?;
                let path = self.output(path);
                persist::write_clinical_csv(&path, &cleaned)?;
            }
            ReportStep::SaveFactorModel { path } => {
                let path = self.output(path);
                persist::save_factor_model(&path, self.factor()?)?;
            }
            ReportStep::SavePlsdaModel { path } => {
                let path = self.output(path);
                persist::save_plsda_model(&path, self.plsda()?)?;
            }
            ReportStep::ExportFactorScores { path } => {
                let path = self.output(path);
                persist::write_factor_scores(&path, self.factor()?)?;
            }
            ReportStep::ExportSelectedFeatures { path } => {
                let path = self.output(path);
                persist::write_selected_features(&path, self.plsda()?)?;
            }

            // === Plots ===
            ReportStep::Plot { kind, path } => {
                let full = self.output_dir.join(path);
                self.render(kind, &full)?;
                self.outputs.push(full);
            }
        }
        Ok(self)
    }

    fn render(&self, kind: &PlotKind, path: &Path) -> Result<()> {
        match kind {
            PlotKind::Loadings { block, component, top_n } => {
                plot_loadings(self.plsda()?, block, *component, *top_n, path)
            }
            PlotKind::Individuals { block, comp_x, comp_y } => {
                plot_individuals(self.plsda()?, block.as_deref(), *comp_x, *comp_y, path)
            }
            PlotKind::Variables { comp_x, comp_y } => plot_variables(self.plsda()?, *comp_x, *comp_y, path),
            PlotKind::VarianceExplained => plot_variance_explained(self.factor()?, path),
            PlotKind::FactorCorrelation => plot_factor_correlation(self.factor()?, path),
            PlotKind::FactorCovariate { factor, covariate, options } => {
                let table = FactorCovariateTable::build(self.factor()?, self.join()?, covariate)?;
                plot_factor_covariate(&table, *factor, options, path)
            }
        }
    }

    fn finalize(self, name: &str) -> Result<ReportOutput> {
        let assays = &self.dataset.assays;

        let plsda = match &self.plsda {
            Some(model) => {
                let accuracy = match model.predict(assays) {
                    Ok(prediction) => prediction.accuracy(&model.labels),
                    Err(e) => {
                        warn!(error = %e, "Could not project training samples");
                        f64::NAN
                    }
                };
                Some(PlsdaSummary {
                    ncomp: model.ncomp,
                    sparse: model.sparse,
                    iterations: model.iterations.clone(),
                    converged: model.converged.clone(),
                    selected: model
                        .blocks
                        .iter()
                        .map(|b| (b.name.clone(), (0..model.ncomp).map(|c| b.n_selected(c)).collect()))
                        .collect(),
                    training_accuracy: accuracy,
                })
            }
            None => None,
        };

        let factor = self.factor.as_ref().map(|model| FactorSummary {
            n_factors: model.n_factors(),
            iterations: model.iterations,
            final_elbo: model.elbo.last().copied().unwrap_or(f64::NAN),
            r2_total: model
                .view_names
                .iter()
                .cloned()
                .zip(model.r2_total.iter().copied())
                .collect(),
        });

        let join = self.join.as_ref().map(|join| JoinSummary {
            matched: join.n_matched(),
            unmatched: join.unmatched().into_iter().map(String::from).collect(),
            ambiguous: join.ambiguous().into_iter().map(String::from).collect(),
            shared: join.sharing_samples().into_iter().map(String::from).collect(),
            keys_unique: join.keys_unique(),
        });

        let summary = ReportSummary {
            name: name.to_string(),
            dataset: self.dataset.name.clone(),
            generated: chrono::Utc::now().to_rfc3339(),
            n_samples: assays.n_samples(),
            blocks: assays
                .iter()
                .map(|(name, table)| BlockSummary {
                    name: name.to_string(),
                    n_features: table.n_features(),
                    n_missing: table.n_missing(),
                })
                .collect(),
            plsda,
            factor,
            join,
            outputs: self.outputs,
        };
        info!(report = %name, outputs = summary.outputs.len(), "Report finished");

        Ok(ReportOutput {
            summary,
            plsda: self.plsda,
            factor: self.factor,
            join: self.join,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AssayTable, Metadata, MultiAssay, Outcome};
    use tempfile::TempDir;

    fn dataset(with_clinical: bool) -> LoadedDataset {
        let ids: Vec<String> = (0..10).map(|i| format!("TCGA-A2-{:04}-01A", i)).collect();
        dataset_with_ids(ids, with_clinical)
    }

    fn dataset_with_ids(ids: Vec<String>, with_clinical: bool) -> LoadedDataset {
        let make = |p: usize, salt: usize| {
            let rows: Vec<Vec<f64>> = (0..10)
                .map(|i| {
                    let shift = if i % 2 == 0 { 1.0 } else { -1.0 };
                    (0..p)
                        .map(|j| shift * (j % 3) as f64 + ((i * 7 + j * 5 + salt) % 11) as f64 * 0.3)
                        .collect()
                })
                .collect();
            AssayTable::from_rows(&rows, ids.clone(), (0..p).map(|j| format!("f{}", j)).collect()).unwrap()
        };
        let assays = MultiAssay::new(vec![
            ("mrna".to_string(), make(6, 0)),
            ("protein".to_string(), make(4, 3)),
        ])
        .unwrap();
        let labels = (0..10).map(|i| if i % 2 == 0 { "Basal" } else { "LumA" }.to_string()).collect();
        let clinical = with_clinical.then(|| {
            let records = (0..9)
                .map(|i| (format!("TCGA-A2-{:04}", i), vec![(50 + i).to_string()]))
                .collect();
            Metadata::from_records(vec!["age".to_string()], records).unwrap()
        });
        LoadedDataset {
            name: "toy".to_string(),
            assays,
            outcome: Some(Outcome::categorical(ids, labels).unwrap()),
            clinical,
        }
    }

    #[test]
    fn test_report_builder() {
        let report = Report::new()
            .name("test")
            .diablo(2)
            .join_clinical(IdPattern::TcgaParticipant, false)
            .export_clinical("clinical.csv", &["age"]);
        let config = report.to_config(Some("Test report"), "manifest.yaml", "out");
        assert_eq!(config.steps.len(), 3);
        assert_eq!(config.name, "test");
        assert_eq!(config.steps[1].label(), "join_clinical");
    }

    #[test]
    fn test_report_config_yaml() {
        let config = ReportConfig::example();
        let yaml = config.to_yaml().unwrap();
        let parsed = ReportConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_report_run_diablo_and_join() {
        let dir = TempDir::new().unwrap();
        let output = Report::new()
            .name("toy")
            .diablo(2)
            .join_clinical(IdPattern::TcgaParticipant, false)
            .export_clinical("clinical.csv", &[])
            .export_selected_features("selected.tsv")
            .plot(PlotKind::Variables { comp_x: 0, comp_y: 1 }, "variables.svg")
            .run(&dataset(true), dir.path())
            .unwrap();

        let join = output.summary.join.as_ref().unwrap();
        assert_eq!(join.matched, 9);
        assert_eq!(join.unmatched, vec!["TCGA-A2-0009-01A"]);
        assert_eq!(output.summary.plsda.as_ref().unwrap().selected["mrna"], vec![6, 6]);
        assert_eq!(output.summary.outputs.len(), 3);
        for path in &output.summary.outputs {
            assert!(path.exists(), "{} missing", path.display());
        }
    }

    #[test]
    fn test_report_strict_join_fails() {
        let dir = TempDir::new().unwrap();
        let result = Report::new()
            .join_clinical(IdPattern::TcgaParticipant, true)
            .run(&dataset(true), dir.path());
        assert!(matches!(result, Err(OmicsError::Report(msg)) if msg.contains("join_clinical")));
    }

    #[test]
    fn test_report_strict_join_rejects_shared_participant() {
        let mut ids: Vec<String> = (0..9).map(|i| format!("TCGA-A2-{:04}-01A", i)).collect();
        ids.push("TCGA-A2-0000-11A".to_string());
        let data = dataset_with_ids(ids, true);
        let dir = TempDir::new().unwrap();

        let result = Report::new()
            .join_clinical(IdPattern::TcgaParticipant, true)
            .run(&data, dir.path());
        assert!(matches!(result, Err(OmicsError::Report(msg)) if msg.contains("sharing a key")));

        let output = Report::new()
            .join_clinical(IdPattern::TcgaParticipant, false)
            .run(&data, dir.path())
            .unwrap();
        let join = output.summary.join.unwrap();
        assert_eq!(join.matched, 10);
        assert!(!join.keys_unique);
        assert_eq!(join.shared, vec!["TCGA-A2-0000-01A".to_string(), "TCGA-A2-0000-11A".to_string()]);
    }

    #[test]
    fn test_report_step_order_errors() {
        let dir = TempDir::new().unwrap();
        let result = Report::new()
            .plot(PlotKind::VarianceExplained, "variance.svg")
            .run(&dataset(true), dir.path());
        assert!(result.is_err());

        let result = Report::new()
            .join_clinical(IdPattern::Identity, false)
            .run(&dataset(false), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_id_pattern_compile() {
        let p = IdPattern::SuffixAfter { separator: '-' }.compile().unwrap();
        assert_eq!(p.normalize("cohort-7-P012"), "P012");
        assert!(IdPattern::Regex { pattern: "no_group".to_string() }.compile().is_err());
    }
}
