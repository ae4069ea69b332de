//! Clinical / sample metadata tables.

use crate::error::{OmicsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A variable value that can be categorical, continuous, or ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Ordinal variable with integer rank.
    Ordinal(i64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64 (ordinals are widened).
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            Variable::Ordinal(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as ordinal i64.
    pub fn as_ordinal(&self) -> Option<i64> {
        match self {
            Variable::Ordinal(v) => Some(*v),
            _ => None,
        }
    }

    /// Text form used in exports; missing values become `NA`.
    pub fn to_field(&self) -> String {
        match self {
            Variable::Categorical(s) => s.clone(),
            Variable::Continuous(v) => v.to_string(),
            Variable::Ordinal(v) => v.to_string(),
            Variable::Missing => "NA".to_string(),
        }
    }
}

/// Type hint for columns when loading metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
    Ordinal,
}

/// Sample metadata: one row per record, keyed by a sample identifier.
///
/// Rows are kept in file order and identifiers are not required to be
/// unique, so that joins can detect ambiguous keys instead of silently
/// keeping the last row.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Sample IDs in row order.
    sample_ids: Vec<String>,
    /// Column names (excluding the ID column).
    column_names: Vec<String>,
    /// One map per row: column_name -> Variable.
    rows: Vec<HashMap<String, Variable>>,
    /// Type of each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            rows: Vec::new(),
            column_types: HashMap::new(),
        }
    }

    /// Build metadata from raw string records.
    ///
    /// Columns are inferred as continuous if all non-missing values parse as
    /// numbers, otherwise categorical. Use `with_column_types` to override.
    pub fn from_records(column_names: Vec<String>, records: Vec<(String, Vec<String>)>) -> Result<Self> {
        if records.is_empty() {
            return Err(OmicsError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = records.iter().all(|(_, values)| match values.get(col_idx) {
                None => true,
                Some(v) => is_missing_token(v) || v.trim().parse::<f64>().is_ok(),
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for (sample_id, values) in records {
            let mut row = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx) {
                    None => Variable::Missing,
                    Some(raw) => parse_variable(raw, column_types[col_name]),
                };
                row.insert(col_name.clone(), var);
            }
            sample_ids.push(sample_id);
            rows.push(row);
        }

        Ok(Self {
            sample_ids,
            column_names,
            rows,
            column_types,
        })
    }

    /// Load metadata from a delimited file.
    ///
    /// Lines starting with `#` are skipped (cBioPortal-style clinical
    /// headers). The identifier column is `id_column` if given, otherwise the
    /// first column.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8, id_column: Option<&str>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(|s| s.trim().to_string()).collect();
        if header.len() < 2 {
            return Err(OmicsError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let id_idx = match id_column {
            Some(name) => header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| OmicsError::MissingColumn(name.to_string()))?,
            None => 0,
        };
        let column_names: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let sample_id = record.get(id_idx).unwrap_or_default().trim().to_string();
            let values: Vec<String> = (0..header.len())
                .filter(|i| *i != id_idx)
                .map(|i| record.get(i).unwrap_or_default().to_string())
                .collect();
            records.push((sample_id, values));
        }

        Self::from_records(column_names, records)
    }

    /// Load metadata from a TSV file (ID in the first column).
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t', None)
    }

    /// Load metadata from a CSV file (ID in the first column).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b',', None)
    }

    /// Set type hints for specific columns.
    pub fn with_column_types(mut self, types: HashMap<String, VariableType>) -> Self {
        for (col_name, var_type) in &types {
            self.column_types.insert(col_name.clone(), *var_type);
            for row in self.rows.iter_mut() {
                if let Some(var) = row.get_mut(col_name) {
                    *var = convert_variable(var, *var_type);
                }
            }
        }
        self
    }

    /// Sample IDs in row order (may contain duplicates).
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of rows.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Value at a row index.
    pub fn get_at(&self, row: usize, column: &str) -> Option<&Variable> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Value for the first row with the given sample ID.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        let row = self.sample_ids.iter().position(|s| s == sample_id)?;
        self.get_at(row, column)
    }

    /// All values for a column in row order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(OmicsError::MissingColumn(column.to_string()));
        }
        Ok(self
            .rows
            .iter()
            .map(|r| r.get(column).unwrap_or(&Variable::Missing))
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Get unique levels for a categorical column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        let mut levels: Vec<String> = values
            .iter()
            .filter_map(|v| v.as_categorical().map(String::from))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Subset to the first row of each requested sample, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut rows = Vec::with_capacity(sample_ids.len());
        for sid in sample_ids {
            let idx = self.sample_ids.iter().position(|s| s == sid).ok_or_else(|| {
                OmicsError::SampleMismatch(format!("Sample '{}' not found in metadata", sid))
            })?;
            rows.push(self.rows[idx].clone());
        }
        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            column_names: self.column_names.clone(),
            rows,
            column_types: self.column_types.clone(),
        })
    }

    /// Replace every sample ID with `f(id)`, keeping row order.
    pub fn map_sample_ids<F: Fn(&str) -> String>(&self, f: F) -> Self {
        Self {
            sample_ids: self.sample_ids.iter().map(|s| f(s)).collect(),
            column_names: self.column_names.clone(),
            rows: self.rows.clone(),
            column_types: self.column_types.clone(),
        }
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.sample_ids.iter().any(|s| s == sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

fn is_missing_token(raw: &str) -> bool {
    matches!(raw.trim(), "" | "NA" | "na" | "[Not Available]" | "[Not Applicable]")
}

fn parse_variable(raw: &str, var_type: VariableType) -> Variable {
    if is_missing_token(raw) {
        return Variable::Missing;
    }
    let trimmed = raw.trim();
    match var_type {
        VariableType::Continuous => trimmed
            .parse::<f64>()
            .map(Variable::Continuous)
            .unwrap_or(Variable::Missing),
        VariableType::Ordinal => trimmed
            .parse::<i64>()
            .map(Variable::Ordinal)
            .unwrap_or(Variable::Missing),
        VariableType::Categorical => Variable::Categorical(trimmed.to_string()),
    }
}

fn convert_variable(var: &Variable, var_type: VariableType) -> Variable {
    match var {
        Variable::Categorical(s) => parse_variable(s, var_type),
        Variable::Continuous(v) => match var_type {
            VariableType::Continuous => Variable::Continuous(*v),
            VariableType::Ordinal => Variable::Ordinal(*v as i64),
            VariableType::Categorical => Variable::Categorical(v.to_string()),
        },
        Variable::Ordinal(v) => match var_type {
            VariableType::Continuous => Variable::Continuous(*v as f64),
            VariableType::Ordinal => Variable::Ordinal(*v),
            VariableType::Categorical => Variable::Categorical(v.to_string()),
        },
        Variable::Missing => Variable::Missing,
    }
}
