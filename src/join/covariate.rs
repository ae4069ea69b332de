//! Factor scores paired with one clinical covariate.

use super::{ClinicalJoin, MatchStatus};
use crate::data::{Variable, VariableType};
use crate::error::{OmicsError, Result};
use crate::model::FactorModel;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Covariate values, one per row of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CovariateValues {
    Continuous(Vec<f64>),
    Categorical(Vec<String>),
}

/// Factor scores and a covariate for every matched sample with a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorCovariateTable {
    pub covariate: String,
    pub sample_ids: Vec<String>,
    pub factor_names: Vec<String>,
    /// Scores (rows × factors).
    pub scores: DMatrix<f64>,
    pub values: CovariateValues,
}

impl FactorCovariateTable {
    /// Pair factor scores with a clinical covariate.
    ///
    /// Unmatched and ambiguous samples are skipped, as are samples whose
    /// covariate is missing.
    pub fn build(model: &FactorModel, join: &ClinicalJoin, covariate: &str) -> Result<Self> {
        let clinical = join.clinical();
        let column_type = clinical
            .column_type(covariate)
            .ok_or_else(|| OmicsError::MissingColumn(covariate.to_string()))?;
        let categorical = column_type == VariableType::Categorical;

        let positions: HashMap<&str, usize> = model
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let mut sample_ids = Vec::new();
        let mut score_rows = Vec::new();
        let mut numbers = Vec::new();
        let mut labels = Vec::new();
        for sample in join.samples() {
            let MatchStatus::Matched(row) = sample.status else {
                continue;
            };
            let Some(&position) = positions.get(sample.sample_id.as_str()) else {
                return Err(OmicsError::SampleMismatch(format!(
                    "sample '{}' is not part of the factor model",
                    sample.sample_id
                )));
            };
            let value = match clinical.get_at(row, covariate) {
                Some(v) if !v.is_missing() => v,
                _ => continue,
            };

            if categorical {
                labels.push(match value {
                    Variable::Categorical(s) => s.clone(),
                    other => other.to_field(),
                });
            } else {
                match value.as_continuous() {
                    Some(x) => numbers.push(x),
                    None => continue,
                }
            }
            sample_ids.push(sample.sample_id.clone());
            score_rows.push(position);
        }

        if sample_ids.is_empty() {
            return Err(OmicsError::EmptyData(format!(
                "no matched sample has a value for '{}'",
                covariate
            )));
        }

        let n_factors = model.n_factors();
        let scores = DMatrix::from_fn(score_rows.len(), n_factors, |i, k| model.scores[(score_rows[i], k)]);

        Ok(Self {
            covariate: covariate.to_string(),
            sample_ids,
            factor_names: model.factor_names(),
            scores,
            values: if categorical {
                CovariateValues::Categorical(labels)
            } else {
                CovariateValues::Continuous(numbers)
            },
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.values, CovariateValues::Categorical(_))
    }

    /// Scores of one factor.
    pub fn factor(&self, factor: usize) -> Result<Vec<f64>> {
        if factor >= self.scores.ncols() {
            return Err(OmicsError::InvalidParameter(format!(
                "factor {} requested but the table has {}",
                factor + 1,
                self.scores.ncols()
            )));
        }
        Ok(self.scores.column(factor).iter().copied().collect())
    }

    /// Sorted distinct groups of a categorical covariate.
    pub fn groups(&self) -> Vec<String> {
        match &self.values {
            CovariateValues::Categorical(labels) => {
                let mut groups = labels.clone();
                groups.sort();
                groups.dedup();
                groups
            }
            CovariateValues::Continuous(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Metadata, SampleIdPattern};
    use crate::join::join_clinical;
    use crate::model::FactorOptions;

    fn model() -> FactorModel {
        let sample_ids: Vec<String> = ["S1", "S2", "S3", "S4"].iter().map(|s| s.to_string()).collect();
        FactorModel {
            view_names: vec!["rna".to_string()],
            sample_ids,
            feature_ids: vec![vec!["g1".to_string()]],
            scores: DMatrix::from_row_slice(4, 2, &[0.1, 1.0, 0.2, 2.0, 0.3, 3.0, 0.4, 4.0]),
            weights: vec![DMatrix::zeros(1, 2)],
            r2: DMatrix::zeros(1, 2),
            r2_total: vec![0.0],
            elbo: vec![-1.0],
            iterations: 1,
            converged: true,
            view_scales: vec![1.0],
            options: FactorOptions::default(),
        }
    }

    fn clinical() -> Metadata {
        let rec = |id: &str, age: &str, sex: &str| (id.to_string(), vec![age.to_string(), sex.to_string()]);
        Metadata::from_records(
            vec!["age".to_string(), "sex".to_string()],
            vec![rec("S1", "50", "F"), rec("S2", "NA", "M"), rec("S4", "70", "F")],
        )
        .unwrap()
    }

    #[test]
    fn test_continuous_covariate_skips_missing() {
        let m = model();
        let join = join_clinical(&m.sample_ids, &clinical(), &SampleIdPattern::identity());
        let table = FactorCovariateTable::build(&m, &join, "age").unwrap();

        assert_eq!(table.sample_ids, vec!["S1", "S4"]);
        assert_eq!(table.values, CovariateValues::Continuous(vec![50.0, 70.0]));
        assert_eq!(table.factor(1).unwrap(), vec![1.0, 4.0]);
    }

    #[test]
    fn test_categorical_covariate() {
        let m = model();
        let join = join_clinical(&m.sample_ids, &clinical(), &SampleIdPattern::identity());
        let table = FactorCovariateTable::build(&m, &join, "sex").unwrap();

        assert!(table.is_categorical());
        assert_eq!(table.len(), 3);
        assert_eq!(table.groups(), vec!["F", "M"]);
    }

    #[test]
    fn test_unknown_covariate() {
        let m = model();
        let join = join_clinical(&m.sample_ids, &clinical(), &SampleIdPattern::identity());
        assert!(matches!(
            FactorCovariateTable::build(&m, &join, "bmi"),
            Err(OmicsError::MissingColumn(_))
        ));
    }
}
