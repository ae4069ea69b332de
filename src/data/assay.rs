//! Dense assay table holding one omics modality.

use crate::error::{OmicsError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Orientation of a delimited assay file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// One row per sample, one column per feature.
    #[default]
    SamplesAsRows,
    /// One row per feature, one column per sample.
    FeaturesAsRows,
}

/// A numeric table for one assay (view).
///
/// Rows are samples and columns are features, whatever the orientation of
/// the file it was read from. Missing cells are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssayTable {
    /// Dense matrix (samples × features).
    data: DMatrix<f64>,
    /// Sample identifiers (row names).
    sample_ids: Vec<String>,
    /// Feature identifiers (column names).
    feature_ids: Vec<String>,
}

impl AssayTable {
    /// Create a new AssayTable from a matrix and identifiers.
    pub fn new(data: DMatrix<f64>, sample_ids: Vec<String>, feature_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != sample_ids.len() {
            return Err(OmicsError::DimensionMismatch {
                expected: nrows,
                actual: sample_ids.len(),
            });
        }
        if ncols != feature_ids.len() {
            return Err(OmicsError::DimensionMismatch {
                expected: ncols,
                actual: feature_ids.len(),
            });
        }
        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(OmicsError::SampleMismatch(format!(
                "duplicate sample ID '{}'",
                dup
            )));
        }
        if let Some(dup) = first_duplicate(&feature_ids) {
            return Err(OmicsError::InvalidParameter(format!(
                "duplicate feature ID '{}'",
                dup
            )));
        }
        Ok(Self {
            data,
            sample_ids,
            feature_ids,
        })
    }

    /// Build a table from row-major sample rows.
    pub fn from_rows(rows: &[Vec<f64>], sample_ids: Vec<String>, feature_ids: Vec<String>) -> Result<Self> {
        let n_features = feature_ids.len();
        for row in rows {
            if row.len() != n_features {
                return Err(OmicsError::DimensionMismatch {
                    expected: n_features,
                    actual: row.len(),
                });
            }
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = DMatrix::from_row_slice(rows.len(), n_features, &flat);
        Self::new(data, sample_ids, feature_ids)
    }

    /// Load an assay table from a delimited text file.
    ///
    /// Expected format:
    /// - First row: header; its first cell names the identifier column
    /// - Subsequent rows: an identifier followed by numeric values
    ///
    /// `NA`, `NaN` and empty cells are read as missing.
    pub fn from_delimited<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        orientation: Orientation,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(OmicsError::EmptyData(
                "Assay file must have at least one value column".to_string(),
            ));
        }
        let column_ids: Vec<String> = headers.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut row_ids = Vec::new();
        let mut values = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            row_ids.push(record.get(0).unwrap_or_default().trim().to_string());
            for (col_idx, raw) in record.iter().skip(1).enumerate() {
                values.push(parse_cell(raw).ok_or_else(|| OmicsError::InvalidValue {
                    value: raw.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?);
            }
        }

        if row_ids.is_empty() {
            return Err(OmicsError::EmptyData("No rows in assay file".to_string()));
        }

        let on_disk = DMatrix::from_row_slice(row_ids.len(), column_ids.len(), &values);
        match orientation {
            Orientation::SamplesAsRows => Self::new(on_disk, row_ids, column_ids),
            Orientation::FeaturesAsRows => Self::new(on_disk.transpose(), column_ids, row_ids),
        }
    }

    /// Load a tab-separated assay table.
    pub fn from_tsv<P: AsRef<Path>>(path: P, orientation: Orientation) -> Result<Self> {
        Self::from_delimited(path, b'\t', orientation)
    }

    /// Load a comma-separated assay table.
    pub fn from_csv<P: AsRef<Path>>(path: P, orientation: Orientation) -> Result<Self> {
        Self::from_delimited(path, b',', orientation)
    }

    /// Write the table as TSV with samples as rows.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample_id")?;
        for feature_id in &self.feature_ids {
            write!(writer, "\t{}", feature_id)?;
        }
        writeln!(writer)?;

        for (row, sample_id) in self.sample_ids.iter().enumerate() {
            write!(writer, "{}", sample_id)?;
            for col in 0..self.n_features() {
                let value = self.data[(row, col)];
                if value.is_nan() {
                    write!(writer, "\tNA")?;
                } else {
                    write!(writer, "\t{}", value)?;
                }
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Value at (sample, feature).
    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.data[(sample, feature)]
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of features (columns).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Underlying matrix (samples × features).
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Matrix in the features × samples orientation expected by factor models.
    pub fn features_by_samples(&self) -> DMatrix<f64> {
        self.data.transpose()
    }

    /// Position of a feature by identifier.
    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|f| f == feature_id)
    }

    /// All values of one feature across samples.
    pub fn column(&self, feature: usize) -> Vec<f64> {
        self.data.column(feature).iter().copied().collect()
    }

    /// All values of one sample across features.
    pub fn row(&self, sample: usize) -> Vec<f64> {
        self.data.row(sample).iter().copied().collect()
    }

    /// Number of missing cells.
    pub fn n_missing(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    /// Subset to the given sample indices, in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            if idx >= self.n_samples() {
                return Err(OmicsError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    idx
                )));
            }
        }
        let data = self.data.select_rows(indices);
        let sample_ids = indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::new(data, sample_ids, self.feature_ids.clone())
    }

    /// Subset to the given feature indices, in the given order.
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            if idx >= self.n_features() {
                return Err(OmicsError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    idx
                )));
            }
        }
        let data = self.data.select_columns(indices);
        let feature_ids = indices.iter().map(|&i| self.feature_ids[i].clone()).collect();
        Self::new(data, self.sample_ids.clone(), feature_ids)
    }

    /// Reorder rows to follow `sample_ids` exactly.
    ///
    /// Every requested sample must be present; this never drops or invents rows
    /// silently.
    pub fn reorder_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let position: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let indices = sample_ids
            .iter()
            .map(|sid| {
                position.get(sid.as_str()).copied().ok_or_else(|| {
                    OmicsError::SampleMismatch(format!("sample '{}' not found in assay", sid))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.subset_samples(&indices)
    }
}

fn parse_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "NA" | "na" | "NaN" | "nan" => Some(f64::NAN),
        _ => trimmed.parse::<f64>().ok(),
    }
}

fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().find(|id| !seen.insert(id.as_str())).map(|s| s.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_table() -> AssayTable {
        // 4 samples × 3 features
        AssayTable::from_rows(
            &[
                vec![1.0, 2.0, 3.0],
                vec![4.0, 5.0, 6.0],
                vec![7.0, f64::NAN, 9.0],
                vec![10.0, 11.0, 12.0],
            ],
            vec!["S1".into(), "S2".into(), "S3".into(), "S4".into()],
            vec!["gA".into(), "gB".into(), "gC".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_samples(), 4);
        assert_eq!(table.n_features(), 3);
        assert_eq!(table.get(1, 2), 6.0);
        assert_eq!(table.n_missing(), 1);
    }

    #[test]
    fn test_tsv_roundtrip() {
        let table = create_test_table();
        let file = NamedTempFile::new().unwrap();
        table.to_tsv(file.path()).unwrap();

        let loaded = AssayTable::from_tsv(file.path(), Orientation::SamplesAsRows).unwrap();
        assert_eq!(loaded.sample_ids(), table.sample_ids());
        assert_eq!(loaded.feature_ids(), table.feature_ids());
        assert!(loaded.get(2, 1).is_nan());
        assert_eq!(loaded.get(3, 0), 10.0);
    }

    #[test]
    fn test_features_as_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature,S1,S2,S3").unwrap();
        writeln!(file, "geneA,1.5,2.5,NA").unwrap();
        writeln!(file, "geneB,0,1,2").unwrap();
        file.flush().unwrap();

        let table = AssayTable::from_csv(file.path(), Orientation::FeaturesAsRows).unwrap();
        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.n_features(), 2);
        assert_eq!(table.sample_ids(), &["S1", "S2", "S3"]);
        assert_eq!(table.feature_ids(), &["geneA", "geneB"]);
        assert_eq!(table.get(1, 0), 2.5);
        assert!(table.get(2, 0).is_nan());
    }

    #[test]
    fn test_invalid_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample\tg1").unwrap();
        writeln!(file, "S1\tabc").unwrap();
        file.flush().unwrap();

        let err = AssayTable::from_tsv(file.path(), Orientation::SamplesAsRows).unwrap_err();
        assert!(matches!(err, OmicsError::InvalidValue { .. }));
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let result = AssayTable::from_rows(
            &[vec![1.0], vec![2.0]],
            vec!["S1".into(), "S1".into()],
            vec!["g".into()],
        );
        assert!(matches!(result, Err(OmicsError::SampleMismatch(_))));
    }

    #[test]
    fn test_subset_and_reorder() {
        let table = create_test_table();
        let subset = table.subset_features(&[2, 0]).unwrap();
        assert_eq!(subset.feature_ids(), &["gC", "gA"]);
        assert_eq!(subset.get(0, 0), 3.0);

        let reordered = table
            .reorder_samples(&["S4".to_string(), "S1".to_string()])
            .unwrap();
        assert_eq!(reordered.sample_ids(), &["S4", "S1"]);
        assert_eq!(reordered.get(0, 0), 10.0);

        assert!(table.reorder_samples(&["S9".to_string()]).is_err());
    }
}
