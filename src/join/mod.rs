//! Left-safe join of analysis samples with clinical metadata.
//!
//! Every analysis sample ends up in exactly one of three states: matched to
//! one clinical row, unmatched, or ambiguous (several clinical rows share its
//! normalized key). Clinical rows are never duplicated silently: analysis
//! samples that collapse onto one key are reported by `shared_keys`, and
//! `keys_unique` is false whenever either side repeats a key.

mod covariate;

pub use covariate::{CovariateValues, FactorCovariateTable};

use crate::data::{Metadata, SampleIdPattern, Variable};
use crate::error::{OmicsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Match state of one analysis sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Exactly one clinical row; holds its row index.
    Matched(usize),
    /// No clinical row carries the key.
    Unmatched,
    /// Several clinical rows carry the key; holds their row indices.
    Ambiguous(Vec<usize>),
}

/// One analysis sample and its join outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedSample {
    /// Identifier as it appears in the analysis.
    pub sample_id: String,
    /// Normalized join key.
    pub key: String,
    pub status: MatchStatus,
}

/// Result of joining analysis samples to a clinical table.
#[derive(Debug, Clone)]
pub struct ClinicalJoin {
    samples: Vec<JoinedSample>,
    clinical: Metadata,
    duplicate_keys: Vec<String>,
    shared_keys: Vec<String>,
}

/// Clinical subset for matched samples, in analysis order.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedClinical {
    pub sample_ids: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Variable>>,
}

impl CleanedClinical {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of one column for one row.
    pub fn value(&self, row: usize, column: &str) -> Option<&Variable> {
        let c = self.columns.iter().position(|x| x == column)?;
        self.rows.get(row).and_then(|r| r.get(c))
    }
}

/// Join analysis sample identifiers to clinical rows.
///
/// Both sides are normalized with `pattern` before comparison.
///
/// # Arguments
/// * `sample_ids` - Analysis sample identifiers, in analysis order
/// * `clinical` - Clinical metadata (rows may repeat a key)
/// * `pattern` - Identifier normalization applied to both sides
pub fn join_clinical(sample_ids: &[String], clinical: &Metadata, pattern: &SampleIdPattern) -> ClinicalJoin {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (row, id) in clinical.sample_ids().iter().enumerate() {
        index.entry(pattern.normalize(id)).or_default().push(row);
    }

    let mut duplicate_keys: Vec<String> = index
        .iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(k, _)| k.clone())
        .collect();
    duplicate_keys.sort();

    let samples: Vec<JoinedSample> = sample_ids
        .iter()
        .map(|sid| {
            let key = pattern.normalize(sid);
            let status = match index.get(&key).map(|v| v.as_slice()) {
                None | Some([]) => MatchStatus::Unmatched,
                Some([row]) => MatchStatus::Matched(*row),
                Some(rows) => MatchStatus::Ambiguous(rows.to_vec()),
            };
            JoinedSample {
                sample_id: sid.clone(),
                key,
                status,
            }
        })
        .collect();

    let mut per_key: HashMap<&str, usize> = HashMap::new();
    for s in &samples {
        *per_key.entry(s.key.as_str()).or_default() += 1;
    }
    let mut shared_keys: Vec<String> = per_key
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(k, _)| k.to_string())
        .collect();
    shared_keys.sort();

    let join = ClinicalJoin {
        samples,
        clinical: clinical.clone(),
        duplicate_keys,
        shared_keys,
    };
    info!(
        samples = sample_ids.len(),
        matched = join.n_matched(),
        unmatched = join.unmatched().len(),
        ambiguous = join.ambiguous().len(),
        "Joined clinical metadata"
    );
    if !join.duplicate_keys.is_empty() {
        warn!(keys = join.duplicate_keys.len(), "Clinical join keys are not unique");
    }
    if !join.shared_keys.is_empty() {
        warn!(keys = join.shared_keys.len(), "Several analysis samples share a join key");
    }
    join
}

impl ClinicalJoin {
    /// Per-sample outcomes in analysis order.
    pub fn samples(&self) -> &[JoinedSample] {
        &self.samples
    }

    /// The clinical table joined against.
    pub fn clinical(&self) -> &Metadata {
        &self.clinical
    }

    /// True when every analysis sample matched exactly one row.
    pub fn all_matched(&self) -> bool {
        self.samples
            .iter()
            .all(|s| matches!(s.status, MatchStatus::Matched(_)))
    }

    /// True when every key maps one analysis sample to at most one clinical row.
    pub fn keys_unique(&self) -> bool {
        self.duplicate_keys.is_empty() && self.shared_keys.is_empty()
    }

    /// Normalized clinical keys carried by more than one row.
    pub fn duplicate_keys(&self) -> &[String] {
        &self.duplicate_keys
    }

    /// Normalized keys produced by more than one analysis sample.
    pub fn shared_keys(&self) -> &[String] {
        &self.shared_keys
    }

    /// Analysis samples whose key is shared with another analysis sample.
    pub fn sharing_samples(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter(|s| self.shared_keys.binary_search(&s.key).is_ok())
            .map(|s| s.sample_id.as_str())
            .collect()
    }

    /// Analysis samples without a clinical row.
    pub fn unmatched(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter(|s| s.status == MatchStatus::Unmatched)
            .map(|s| s.sample_id.as_str())
            .collect()
    }

    /// Analysis samples whose key hits several clinical rows.
    pub fn ambiguous(&self) -> Vec<&str> {
        self.samples
            .iter()
            .filter(|s| matches!(s.status, MatchStatus::Ambiguous(_)))
            .map(|s| s.sample_id.as_str())
            .collect()
    }

    /// Number of matched samples.
    pub fn n_matched(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| matches!(s.status, MatchStatus::Matched(_)))
            .count()
    }

    /// Clinical row of a sample, if it matched.
    pub fn matched_row(&self, sample_id: &str) -> Option<usize> {
        self.samples
            .iter()
            .find(|s| s.sample_id == sample_id)
            .and_then(|s| match s.status {
                MatchStatus::Matched(row) => Some(row),
                _ => None,
            })
    }

    /// Clinical subset for matched samples, restricted to `columns`.
    ///
    /// An empty column list keeps every clinical column. Unmatched and
    /// ambiguous samples are left out. Samples listed by `sharing_samples`
    /// each get their own row, so one clinical row may appear several times.
    pub fn cleaned(&self, columns: &[String]) -> Result<CleanedClinical> {
        let columns: Vec<String> = if columns.is_empty() {
            self.clinical.column_names().to_vec()
        } else {
            columns.to_vec()
        };
        for c in &columns {
            if !self.clinical.has_column(c) {
                return Err(OmicsError::MissingColumn(c.clone()));
            }
        }

        let mut sample_ids = Vec::new();
        let mut rows = Vec::new();
        for s in &self.samples {
            if let MatchStatus::Matched(row) = s.status {
                sample_ids.push(s.sample_id.clone());
                rows.push(
                    columns
                        .iter()
                        .map(|c| self.clinical.get_at(row, c).cloned().unwrap_or(Variable::Missing))
                        .collect(),
                );
            }
        }

        Ok(CleanedClinical {
            sample_ids,
            columns,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clinical() -> Metadata {
        Metadata::from_records(
            vec!["age".to_string(), "stage".to_string()],
            vec![
                ("TCGA-A1-0001-01".to_string(), vec!["61".to_string(), "II".to_string()]),
                ("TCGA-A1-0002-01".to_string(), vec!["NA".to_string(), "I".to_string()]),
                ("TCGA-B2-0003-01".to_string(), vec!["47".to_string(), "III".to_string()]),
                ("TCGA-B2-0003-11".to_string(), vec!["47".to_string(), "III".to_string()]),
            ],
        )
        .unwrap()
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_left_safe_statuses() {
        let samples = ids(&["TCGA-A1-0001-01A", "TCGA-A1-0002-01A", "TCGA-B2-0003-01A", "TCGA-C3-0009-01A"]);
        let join = join_clinical(&samples, &clinical(), &SampleIdPattern::tcga_participant());

        assert_eq!(join.samples().len(), samples.len());
        assert_eq!(join.samples()[0].status, MatchStatus::Matched(0));
        assert_eq!(join.samples()[1].status, MatchStatus::Matched(1));
        assert_eq!(join.samples()[2].status, MatchStatus::Ambiguous(vec![2, 3]));
        assert_eq!(join.unmatched(), vec!["TCGA-C3-0009-01A"]);
        assert_eq!(join.ambiguous(), vec!["TCGA-B2-0003-01A"]);
        assert!(!join.all_matched());
        assert!(!join.keys_unique());
        assert_eq!(join.duplicate_keys(), &["0003".to_string()]);
    }

    #[test]
    fn test_cleaned_never_duplicates() {
        let samples = ids(&["TCGA-A1-0002-01A", "TCGA-A1-0001-01A", "TCGA-B2-0003-01A"]);
        let join = join_clinical(&samples, &clinical(), &SampleIdPattern::tcga_participant());
        let cleaned = join.cleaned(&ids(&["age"])).unwrap();

        assert_eq!(cleaned.sample_ids, ids(&["TCGA-A1-0002-01A", "TCGA-A1-0001-01A"]));
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.value(0, "age").unwrap().is_missing());
        assert_eq!(cleaned.value(1, "age").unwrap().as_continuous(), Some(61.0));
    }

    #[test]
    fn test_identity_join_all_matched() {
        let clinical = Metadata::from_records(
            vec!["group".to_string()],
            vec![
                ("S1".to_string(), vec!["a".to_string()]),
                ("S2".to_string(), vec!["b".to_string()]),
            ],
        )
        .unwrap();
        let join = join_clinical(&ids(&["S2", "S1"]), &clinical, &SampleIdPattern::identity());
        assert!(join.all_matched());
        assert!(join.keys_unique());
        assert_eq!(join.matched_row("S2"), Some(1));
    }

    #[test]
    fn test_tumor_and_normal_of_one_participant_flagged() {
        let clinical = Metadata::from_records(
            vec!["age".to_string()],
            vec![("TCGA-A1-0001".to_string(), vec!["58".to_string()])],
        )
        .unwrap();
        let samples = ids(&["TCGA-A1-0001-01A", "TCGA-A1-0001-11A"]);
        let join = join_clinical(&samples, &clinical, &SampleIdPattern::tcga_participant());

        assert!(join.all_matched());
        assert!(join.duplicate_keys().is_empty());
        assert!(!join.keys_unique());
        assert_eq!(join.shared_keys(), &["0001".to_string()]);
        assert_eq!(join.sharing_samples(), vec!["TCGA-A1-0001-01A", "TCGA-A1-0001-11A"]);
    }

    #[test]
    fn test_cleaned_rejects_unknown_column() {
        let join = join_clinical(&ids(&["TCGA-A1-0001-01A"]), &clinical(), &SampleIdPattern::tcga_participant());
        assert!(matches!(join.cleaned(&ids(&["bmi"])), Err(OmicsError::MissingColumn(_))));
    }
}
