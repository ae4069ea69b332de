//! Dataset manifests and remote fetching.
//!
//! A dataset is a directory of delimited assay tables described by a YAML
//! manifest:
//!
//! ```yaml
//! name: breast_tcga
//! assays:
//!   - name: mirna
//!     path: mirna.tsv
//!   - name: mrna
//!     path: mrna.csv
//!     orientation: features_as_rows
//! outcome:
//!   path: subtype.tsv
//!   column: subtype
//! clinical:
//!   url: https://example.org/brca_clinical.tsv
//!   id_column: PATIENT_ID
//! ```

use crate::data::{AssayTable, Metadata, MultiAssay, Orientation, Outcome};
use crate::error::{OmicsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Field delimiter of a table on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    /// Guess from the file extension (`.csv` is comma, anything else tab).
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Comma,
            _ => Self::Tab,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Tab => b'\t',
            Self::Comma => b',',
        }
    }
}

/// One assay entry of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssaySource {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<Delimiter>,
}

/// Where the outcome labels live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSource {
    /// Table with one row per sample, in assay order.
    pub path: PathBuf,
    /// Column holding the label.
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<Delimiter>,
}

/// Clinical table, local or remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<Delimiter>,
}

/// Dataset manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub name: String,
    pub assays: Vec<AssaySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical: Option<ClinicalSource>,
}

impl DatasetManifest {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(OmicsError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(OmicsError::from)
    }

    /// Read a manifest file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }
}

/// Everything a manifest resolves to.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub name: String,
    pub assays: MultiAssay,
    pub outcome: Option<Outcome>,
    pub clinical: Option<Metadata>,
}

/// Load a dataset from its manifest, resolving paths against the manifest's
/// directory.
///
/// Fails if the assays do not share an identical ordered sample axis or if
/// the outcome table is not aligned with it.
pub fn load_dataset<P: AsRef<Path>>(manifest_path: P, cache_dir: Option<&Path>) -> Result<LoadedDataset> {
    let manifest_path = manifest_path.as_ref();
    let manifest = DatasetManifest::from_file(manifest_path)?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    load_manifest(&manifest, base, cache_dir)
}

/// Load a dataset from an in-memory manifest.
pub fn load_manifest(manifest: &DatasetManifest, base: &Path, cache_dir: Option<&Path>) -> Result<LoadedDataset> {
    let mut blocks = Vec::with_capacity(manifest.assays.len());
    for source in &manifest.assays {
        let path = base.join(&source.path);
        let delimiter = source.delimiter.unwrap_or_else(|| Delimiter::infer(&path));
        let table = AssayTable::from_delimited(&path, delimiter.byte(), source.orientation)?;
        info!(
            block = %source.name,
            samples = table.n_samples(),
            features = table.n_features(),
            "assay loaded"
        );
        if table.n_missing() > 0 {
            warn!(block = %source.name, missing = table.n_missing(), "assay has missing values");
        }
        blocks.push((source.name.clone(), table));
    }
    let assays = MultiAssay::new(blocks)?;

    let outcome = match &manifest.outcome {
        Some(source) => {
            let path = base.join(&source.path);
            let delimiter = source.delimiter.unwrap_or_else(|| Delimiter::infer(&path));
            let table = Metadata::from_delimited(&path, delimiter.byte(), None)?;
            crate::data::check_same_axis("assays", assays.sample_ids(), "outcome table", table.sample_ids())?;
            let outcome = Outcome::from_metadata(&table, &source.column, assays.sample_ids())?;
            assays.check_outcome(&outcome)?;
            Some(outcome)
        }
        None => None,
    };

    let clinical = match &manifest.clinical {
        Some(source) => Some(load_clinical(source, base, cache_dir)?),
        None => None,
    };

    Ok(LoadedDataset {
        name: manifest.name.clone(),
        assays,
        outcome,
        clinical,
    })
}

/// Load a clinical table, fetching it first if it is remote.
pub fn load_clinical(source: &ClinicalSource, base: &Path, cache_dir: Option<&Path>) -> Result<Metadata> {
    let path = match (&source.path, &source.url) {
        (Some(p), _) => base.join(p),
        (None, Some(url)) => {
            let file_name = url
                .rsplit('/')
                .next()
                .and_then(|s| s.split('?').next())
                .filter(|s| !s.is_empty())
                .unwrap_or("clinical.tsv");
            fetch_to_cache(url, cache_dir, file_name)?
        }
        (None, None) => {
            return Err(OmicsError::InvalidParameter(
                "clinical source needs a path or a url".to_string(),
            ))
        }
    };
    let delimiter = source.delimiter.unwrap_or_else(|| Delimiter::infer(&path));
    Metadata::from_delimited(&path, delimiter.byte(), source.id_column.as_deref())
}

/// Download `url` into the cache directory, reusing a cached copy.
pub fn fetch_to_cache(url: &str, cache_dir: Option<&Path>, file_name: &str) -> Result<PathBuf> {
    let cache = cache_dir.map(PathBuf::from).unwrap_or_else(default_cache_dir);
    fs::create_dir_all(&cache)?;

    let dest = cache.join(file_name);
    if dest.exists() {
        info!(file = %dest.display(), "using cached download");
        return Ok(dest);
    }

    info!(url, file = %dest.display(), "downloading");
    download_file(url, &dest)?;
    Ok(dest)
}

/// Remove every cached download.
pub fn clear_cache(cache_dir: Option<&Path>) -> Result<()> {
    let cache = cache_dir.map(PathBuf::from).unwrap_or_else(default_cache_dir);
    if cache.exists() {
        fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("omics-integration")
        .join("downloads")
}

fn download_file(url: &str, dest: &Path) -> Result<()> {
    let output = std::process::Command::new("curl")
        .arg("-sSfL")
        .arg("-o")
        .arg(dest)
        .arg(url)
        .output()
        .map_err(|e| OmicsError::Fetch(format!("failed to run curl: {}", e)))?;

    if !output.status.success() {
        if let Err(e) = fs::remove_file(dest) {
            warn!(path = %dest.display(), error = %e, "Could not remove partial download");
        }
        return Err(OmicsError::Fetch(format!(
            "download of {} failed: {}",
            url,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let meta = fs::metadata(dest)?;
    if meta.len() == 0 {
        fs::remove_file(dest)?;
        return Err(OmicsError::Fetch(format!("downloaded file from {} is empty", url)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, lines: &[&str]) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_delimiter_inference() {
        assert_eq!(Delimiter::infer(Path::new("a/b.csv")), Delimiter::Comma);
        assert_eq!(Delimiter::infer(Path::new("a/b.CSV")), Delimiter::Comma);
        assert_eq!(Delimiter::infer(Path::new("a/b.tsv")), Delimiter::Tab);
        assert_eq!(Delimiter::infer(Path::new("a/b")), Delimiter::Tab);
    }

    #[test]
    fn test_load_dataset() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mrna.tsv", &["id\tg1\tg2", "S1\t1\t2", "S2\t3\t4", "S3\t5\t6"]);
        write(dir.path(), "prot.csv", &["feature,S1,S2,S3", "p1,0.1,0.2,0.3"]);
        write(dir.path(), "labels.tsv", &["id\tsubtype", "S1\tA", "S2\tB", "S3\tA"]);
        write(dir.path(), "clinical.tsv", &["id\tage", "S1\t40", "S3\t55"]);
        write(
            dir.path(),
            "dataset.yaml",
            &[
                "name: toy",
                "assays:",
                "  - name: mrna",
                "    path: mrna.tsv",
                "  - name: protein",
                "    path: prot.csv",
                "    orientation: features_as_rows",
                "outcome:",
                "  path: labels.tsv",
                "  column: subtype",
                "clinical:",
                "  path: clinical.tsv",
            ],
        );

        let loaded = load_dataset(dir.path().join("dataset.yaml"), None).unwrap();
        assert_eq!(loaded.name, "toy");
        assert_eq!(loaded.assays.names(), vec!["mrna", "protein"]);
        assert_eq!(loaded.assays.get("protein").unwrap().n_features(), 1);
        assert_eq!(loaded.outcome.unwrap().levels(), vec!["A", "B"]);
        assert_eq!(loaded.clinical.unwrap().n_samples(), 2);
    }

    #[test]
    fn test_misaligned_outcome_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.tsv", &["id\tg1", "S1\t1", "S2\t3"]);
        write(dir.path(), "labels.tsv", &["id\tsubtype", "S2\tA", "S1\tB"]);
        let manifest = DatasetManifest {
            name: "bad".into(),
            assays: vec![AssaySource {
                name: "a".into(),
                path: "a.tsv".into(),
                orientation: Orientation::SamplesAsRows,
                delimiter: None,
            }],
            outcome: Some(OutcomeSource {
                path: "labels.tsv".into(),
                column: "subtype".into(),
                delimiter: None,
            }),
            clinical: None,
        };

        let result = load_manifest(&manifest, dir.path(), None);
        assert!(matches!(result, Err(OmicsError::SampleMismatch(_))));
    }

    #[test]
    fn test_cached_file_is_reused() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "clinical.tsv", &["id\tage", "S1\t40"]);
        // A cached copy short-circuits the download entirely.
        let path = fetch_to_cache("https://invalid.example/clinical.tsv", Some(dir.path()), "clinical.tsv").unwrap();
        assert_eq!(path, dir.path().join("clinical.tsv"));
    }

    #[test]
    fn test_failed_download_reports_fetch_error() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("no_such_dir").join("clinical.tsv");
        let result = download_file("file:///no/such/source.tsv", &dest);
        assert!(matches!(result, Err(OmicsError::Fetch(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_manifest_yaml_roundtrip() {
        let manifest = DatasetManifest {
            name: "roundtrip".into(),
            assays: vec![AssaySource {
                name: "mirna".into(),
                path: "mirna.tsv".into(),
                orientation: Orientation::FeaturesAsRows,
                delimiter: Some(Delimiter::Tab),
            }],
            outcome: None,
            clinical: Some(ClinicalSource {
                path: None,
                url: Some("https://example.org/c.tsv".into()),
                id_column: Some("PATIENT_ID".into()),
                delimiter: None,
            }),
        };
        let parsed = DatasetManifest::from_yaml(&manifest.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed.assays[0].orientation, Orientation::FeaturesAsRows);
        assert_eq!(parsed.clinical.unwrap().id_column.as_deref(), Some("PATIENT_ID"));
    }
}
