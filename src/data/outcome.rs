//! Per-sample outcome labels.

use crate::data::{Metadata, Variable};
use crate::error::{OmicsError, Result};
use serde::{Deserialize, Serialize};

/// Values of an outcome vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutcomeValues {
    /// Class labels, e.g. cancer subtype.
    Categorical(Vec<String>),
    /// Continuous response.
    Continuous(Vec<f64>),
}

/// One outcome value per sample, carrying its own sample axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    sample_ids: Vec<String>,
    values: OutcomeValues,
}

impl Outcome {
    /// Categorical outcome from parallel vectors.
    pub fn categorical(sample_ids: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if sample_ids.len() != labels.len() {
            return Err(OmicsError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: labels.len(),
            });
        }
        Ok(Self {
            sample_ids,
            values: OutcomeValues::Categorical(labels),
        })
    }

    /// Continuous outcome from parallel vectors.
    pub fn continuous(sample_ids: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if sample_ids.len() != values.len() {
            return Err(OmicsError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            sample_ids,
            values: OutcomeValues::Continuous(values),
        })
    }

    /// Build an outcome from a metadata column, following `sample_ids` order.
    ///
    /// Every sample must have a row and a non-missing value.
    pub fn from_metadata(metadata: &Metadata, column: &str, sample_ids: &[String]) -> Result<Self> {
        if !metadata.has_column(column) {
            return Err(OmicsError::MissingColumn(column.to_string()));
        }

        let mut labels = Vec::with_capacity(sample_ids.len());
        let mut numbers = Vec::with_capacity(sample_ids.len());
        for sid in sample_ids {
            let value = metadata.get(sid, column).ok_or_else(|| {
                OmicsError::SampleMismatch(format!("sample '{}' has no metadata row", sid))
            })?;
            match value {
                Variable::Categorical(s) => labels.push(s.clone()),
                Variable::Continuous(v) => numbers.push(*v),
                Variable::Ordinal(v) => labels.push(v.to_string()),
                Variable::Missing => {
                    return Err(OmicsError::EmptyData(format!(
                        "sample '{}' has a missing '{}' value",
                        sid, column
                    )))
                }
            }
        }

        if numbers.is_empty() {
            Self::categorical(sample_ids.to_vec(), labels)
        } else if labels.is_empty() {
            Self::continuous(sample_ids.to_vec(), numbers)
        } else {
            Err(OmicsError::InvalidParameter(format!(
                "column '{}' mixes categorical and continuous values",
                column
            )))
        }
    }

    /// Sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Raw values.
    pub fn values(&self) -> &OutcomeValues {
        &self.values
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    /// Class labels, if categorical.
    pub fn labels(&self) -> Option<&[String]> {
        match &self.values {
            OutcomeValues::Categorical(l) => Some(l),
            OutcomeValues::Continuous(_) => None,
        }
    }

    /// Sorted distinct class labels (empty for continuous outcomes).
    pub fn levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = self.labels().map(|l| l.to_vec()).unwrap_or_default();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Index of each sample's class within `levels()`.
    pub fn class_indices(&self) -> Option<Vec<usize>> {
        let levels = self.levels();
        let labels = self.labels()?;
        Some(
            labels
                .iter()
                .map(|l| levels.iter().position(|x| x == l).unwrap_or(0))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_levels_and_indices() {
        let outcome = Outcome::categorical(
            vec!["S1".into(), "S2".into(), "S3".into()],
            vec!["LumA".into(), "Basal".into(), "LumA".into()],
        )
        .unwrap();
        assert_eq!(outcome.levels(), vec!["Basal", "LumA"]);
        assert_eq!(outcome.class_indices().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_length_mismatch() {
        let result = Outcome::categorical(vec!["S1".into()], vec!["a".into(), "b".into()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_metadata_follows_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample\tsubtype\tage").unwrap();
        writeln!(file, "S1\tHer2\t50").unwrap();
        writeln!(file, "S2\tBasal\t61").unwrap();
        file.flush().unwrap();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        let order = vec!["S2".to_string(), "S1".to_string()];
        let outcome = Outcome::from_metadata(&meta, "subtype", &order).unwrap();
        assert_eq!(outcome.labels().unwrap(), &["Basal", "Her2"]);

        let age = Outcome::from_metadata(&meta, "age", &order).unwrap();
        assert_eq!(age.values(), &OutcomeValues::Continuous(vec![61.0, 50.0]));

        let missing = Outcome::from_metadata(&meta, "subtype", &["S9".to_string()]);
        assert!(matches!(missing, Err(OmicsError::SampleMismatch(_))));
    }
}
