//! Synthetic multi-omics data with known ground truth.
//!
//! Generates several views over one set of samples. A subset of each view's
//! features shifts with the class label, and every view additionally loads
//! on a few shared latent factors, so both the discriminant and the factor
//! model have something to find. A matching clinical table uses TCGA-style
//! barcodes so the identifier normalization and join can be exercised.

use crate::data::{
    AssaySource, AssayTable, ClinicalSource, DatasetManifest, Delimiter, Metadata, MultiAssay,
    Orientation, Outcome, OutcomeSource,
};
use crate::error::{OmicsError, Result};
use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Shape of one synthetic view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub name: String,
    pub n_features: usize,
    /// Features whose mean depends on the class.
    pub n_informative: usize,
    /// Shift between neighbouring classes, in noise standard deviations.
    pub effect_size: f64,
    pub noise_sd: f64,
}

impl ViewSpec {
    pub fn new(name: &str, n_features: usize, n_informative: usize) -> Self {
        Self {
            name: name.to_string(),
            n_features,
            n_informative,
            effect_size: 1.5,
            noise_sd: 1.0,
        }
    }
}

/// Configuration for synthetic data generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Dataset name.
    pub name: String,
    /// Class labels.
    pub classes: Vec<String>,
    /// Samples per class.
    pub n_samples_per_class: usize,
    /// Views to generate.
    pub views: Vec<ViewSpec>,
    /// Latent factors shared by all views.
    pub n_latent_factors: usize,
    /// Standard deviation of latent-factor weights.
    pub latent_strength: f64,
    /// Probability that any single cell is missing.
    pub missing_fraction: f64,
    /// Fraction of samples that get a clinical row.
    pub clinical_coverage: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            classes: vec!["Basal".to_string(), "Her2".to_string(), "LumA".to_string()],
            n_samples_per_class: 15,
            views: vec![
                ViewSpec::new("mrna", 60, 10),
                ViewSpec::new("mirna", 40, 8),
                ViewSpec::new("protein", 30, 6),
            ],
            n_latent_factors: 2,
            latent_strength: 0.8,
            missing_fraction: 0.0,
            clinical_coverage: 1.0,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    /// Create a new config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set classes and samples per class.
    pub fn with_classes(mut self, classes: &[&str], n_per_class: usize) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self.n_samples_per_class = n_per_class;
        self
    }

    /// Replace the views.
    pub fn with_views(mut self, views: Vec<ViewSpec>) -> Self {
        self.views = views;
        self
    }

    /// Set the fraction of missing cells.
    pub fn with_missing(mut self, fraction: f64) -> Self {
        self.missing_fraction = fraction.clamp(0.0, 0.9);
        self
    }

    /// Set the fraction of samples with clinical rows.
    pub fn with_clinical_coverage(mut self, fraction: f64) -> Self {
        self.clinical_coverage = fraction.clamp(0.0, 1.0);
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // Preset configurations

    /// Dimensions of the TCGA breast-cancer training set (mRNA, miRNA, protein).
    pub fn tcga_like() -> Self {
        Self::new("tcga_like")
            .with_classes(&["Basal", "Her2", "LumA"], 50)
            .with_views(vec![
                ViewSpec::new("mrna", 200, 25),
                ViewSpec::new("mirna", 184, 20),
                ViewSpec::new("protein", 142, 15),
            ])
    }

    /// Tiny two-class dataset for quick checks.
    pub fn small() -> Self {
        Self::new("small")
            .with_classes(&["case", "control"], 6)
            .with_views(vec![
                ViewSpec::new("A", 5, 2),
                ViewSpec::new("B", 8, 3),
                ViewSpec::new("C", 3, 1),
            ])
    }

    fn validate(&self) -> Result<()> {
        if self.classes.len() < 2 || self.n_samples_per_class == 0 {
            return Err(OmicsError::InvalidParameter(
                "need at least two classes with one sample each".to_string(),
            ));
        }
        if self.views.is_empty() {
            return Err(OmicsError::InvalidParameter("need at least one view".to_string()));
        }
        for v in &self.views {
            if v.n_features == 0 || v.n_informative > v.n_features {
                return Err(OmicsError::InvalidParameter(format!(
                    "view '{}' needs n_informative <= n_features and at least one feature",
                    v.name
                )));
            }
        }
        Ok(())
    }
}

/// Features that carry the class signal, per view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub informative: BTreeMap<String, Vec<String>>,
}

impl GroundTruth {
    /// Check if a feature of a view is informative.
    pub fn is_informative(&self, view: &str, feature_id: &str) -> bool {
        self.informative
            .get(view)
            .map(|f| f.iter().any(|x| x == feature_id))
            .unwrap_or(false)
    }
}

/// Result of synthetic data generation.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub assays: MultiAssay,
    pub outcome: Outcome,
    pub clinical: Metadata,
    /// Latent factor values (samples × factors).
    pub latent: DMatrix<f64>,
    pub ground_truth: GroundTruth,
    pub config: SyntheticConfig,
}

impl SyntheticData {
    /// Write views, outcome, clinical table, ground truth and a manifest.
    ///
    /// # Returns
    /// Path of the written `manifest.yaml`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let mut assays = Vec::new();
        for (name, table) in self.assays.iter() {
            let file = format!("{}.tsv", name);
            table.to_tsv(dir.join(&file))?;
            assays.push(AssaySource {
                name: name.to_string(),
                path: PathBuf::from(file),
                orientation: Orientation::SamplesAsRows,
                delimiter: Some(Delimiter::Tab),
            });
        }

        let mut outcome = fs::File::create(dir.join("outcome.tsv"))?;
        writeln!(outcome, "sample_id\tsubtype")?;
        for (sid, label) in self.outcome.sample_ids().iter().zip(self.outcome.labels().unwrap_or_default()) {
            writeln!(outcome, "{}\t{}", sid, label)?;
        }

        let mut clinical = fs::File::create(dir.join("clinical.tsv"))?;
        let columns = self.clinical.column_names();
        writeln!(clinical, "patient_id\t{}", columns.join("\t"))?;
        for (row, sid) in self.clinical.sample_ids().iter().enumerate() {
            let values: Vec<String> = columns
                .iter()
                .map(|c| self.clinical.get_at(row, c).map(|v| v.to_field()).unwrap_or_else(|| "NA".to_string()))
                .collect();
            writeln!(clinical, "{}\t{}", sid, values.join("\t"))?;
        }

        let mut truth = fs::File::create(dir.join("ground_truth.tsv"))?;
        writeln!(truth, "view\tfeature_id")?;
        for (view, features) in &self.ground_truth.informative {
            for f in features {
                writeln!(truth, "{}\t{}", view, f)?;
            }
        }

        fs::write(dir.join("config.yaml"), serde_yaml::to_string(&self.config)?)?;

        let manifest = DatasetManifest {
            name: self.config.name.clone(),
            assays,
            outcome: Some(OutcomeSource {
                path: PathBuf::from("outcome.tsv"),
                column: "subtype".to_string(),
                delimiter: Some(Delimiter::Tab),
            }),
            clinical: Some(ClinicalSource {
                path: Some(PathBuf::from("clinical.tsv")),
                url: None,
                id_column: Some("patient_id".to_string()),
                delimiter: Some(Delimiter::Tab),
            }),
        };
        let manifest_path = dir.join("manifest.yaml");
        fs::write(&manifest_path, manifest.to_yaml()?)?;
        info!(dir = %dir.display(), "Wrote synthetic dataset");
        Ok(manifest_path)
    }
}

const SITES: [&str; 4] = ["A2", "AO", "BH", "E2"];

/// Aliquot-level barcode of sample `i`.
fn barcode(i: usize) -> String {
    format!("TCGA-{}-{:04X}-01A", SITES[i % SITES.len()], i + 1)
}

/// Participant-level barcode of sample `i`, as used by clinical tables.
fn participant(i: usize) -> String {
    format!("TCGA-{}-{:04X}", SITES[i % SITES.len()], i + 1)
}

/// Generate synthetic data with known ground truth.
pub fn generate_synthetic(config: &SyntheticConfig) -> Result<SyntheticData> {
    config.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let standard = Normal::new(0.0, 1.0).map_err(|e| OmicsError::InvalidParameter(e.to_string()))?;

    let n_classes = config.classes.len();
    let n_samples = n_classes * config.n_samples_per_class;
    let class_of: Vec<usize> = (0..n_samples).map(|i| i % n_classes).collect();
    let sample_ids: Vec<String> = (0..n_samples).map(barcode).collect();

    let n_latent = config.n_latent_factors;
    let latent = DMatrix::from_fn(n_samples, n_latent, |_, _| standard.sample(&mut rng));

    let mut blocks = Vec::with_capacity(config.views.len());
    let mut ground_truth = GroundTruth::default();
    for view in &config.views {
        let feature_ids: Vec<String> = (1..=view.n_features).map(|j| format!("{}_{}", view.name, j)).collect();

        let mut informative: Vec<usize> = (0..view.n_features).collect();
        informative.shuffle(&mut rng);
        informative.truncate(view.n_informative);
        informative.sort_unstable();

        // Per informative feature, the class at the top of the ordering.
        let mut offsets = vec![None; view.n_features];
        for (rank, &j) in informative.iter().enumerate() {
            offsets[j] = Some(rank % n_classes);
        }
        let weights = DMatrix::from_fn(view.n_features, n_latent, |_, _| {
            config.latent_strength * standard.sample(&mut rng)
        });

        let mut data = DMatrix::zeros(n_samples, view.n_features);
        for i in 0..n_samples {
            for j in 0..view.n_features {
                let mut value = view.noise_sd * standard.sample(&mut rng);
                for k in 0..n_latent {
                    value += weights[(j, k)] * latent[(i, k)];
                }
                if let Some(offset) = offsets[j] {
                    let level = (class_of[i] + n_classes - offset) % n_classes;
                    value += view.effect_size * view.noise_sd * level as f64;
                }
                if config.missing_fraction > 0.0 && rng.gen::<f64>() < config.missing_fraction {
                    value = f64::NAN;
                }
                data[(i, j)] = value;
            }
        }

        ground_truth.informative.insert(
            view.name.clone(),
            informative.iter().map(|&j| feature_ids[j].clone()).collect(),
        );
        blocks.push((view.name.clone(), AssayTable::new(data, sample_ids.clone(), feature_ids)?));
    }
    let assays = MultiAssay::new(blocks)?;

    let labels: Vec<String> = class_of.iter().map(|&c| config.classes[c].clone()).collect();
    let outcome = Outcome::categorical(sample_ids.clone(), labels.clone())?;

    let stages = ["I", "II", "III"];
    let mut records = Vec::new();
    for i in 0..n_samples {
        if rng.gen::<f64>() >= config.clinical_coverage {
            continue;
        }
        let drift = if n_latent > 0 { 8.0 * latent[(i, 0)] } else { 0.0 };
        let age = (58.0 + drift + 6.0 * standard.sample(&mut rng)).round();
        let stage = stages[rng.gen_range(0..stages.len())];
        records.push((
            participant(i),
            vec![format!("{}", age), stage.to_string(), labels[i].clone()],
        ));
    }
    if records.is_empty() {
        return Err(OmicsError::EmptyData("clinical coverage produced no rows".to_string()));
    }
    let clinical = Metadata::from_records(
        vec!["age".to_string(), "stage".to_string(), "subtype".to_string()],
        records,
    )?;

    info!(
        name = %config.name,
        samples = n_samples,
        views = config.views.len(),
        "Generated synthetic dataset"
    );

    Ok(SyntheticData {
        assays,
        outcome,
        clinical,
        latent,
        ground_truth,
        config: config.clone(),
    })
}
