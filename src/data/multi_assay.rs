//! Named collection of assay tables sharing one sample axis.

use crate::data::{AssayTable, Outcome};
use crate::error::{OmicsError, Result};
use std::collections::HashSet;

/// Ordered mapping from block (assay) name to table.
///
/// Every table has the same sample identifiers in the same order. This is
/// checked once at construction; downstream fits index samples by position.
#[derive(Debug, Clone)]
pub struct MultiAssay {
    blocks: Vec<(String, AssayTable)>,
}

impl MultiAssay {
    /// Build a multi-assay set, validating the shared sample axis.
    pub fn new(blocks: Vec<(String, AssayTable)>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(OmicsError::EmptyData("No assay blocks supplied".to_string()));
        }

        let mut names = HashSet::new();
        for (name, _) in &blocks {
            if !names.insert(name.as_str()) {
                return Err(OmicsError::InvalidParameter(format!(
                    "Duplicate block name '{}'",
                    name
                )));
            }
        }

        let (ref_name, reference) = &blocks[0];
        for (name, table) in &blocks[1..] {
            check_same_axis(ref_name, reference.sample_ids(), name, table.sample_ids())?;
        }

        Ok(Self { blocks })
    }

    /// Block names in order.
    pub fn names(&self) -> Vec<&str> {
        self.blocks.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Shared sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        self.blocks[0].1.sample_ids()
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.blocks[0].1.n_samples()
    }

    /// Number of blocks.
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Look up a block by name.
    pub fn get(&self, name: &str) -> Option<&AssayTable> {
        self.blocks.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Position of a block by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.blocks.iter().position(|(n, _)| n == name)
    }

    /// Iterate over (name, table) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssayTable)> {
        self.blocks.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Keep only the named blocks, in the order given.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let blocks = names
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .map(|t| (name.clone(), t))
                    .ok_or_else(|| OmicsError::UnknownBlock(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(blocks)
    }

    /// Verify that an outcome vector is aligned 1:1 with the sample axis.
    pub fn check_outcome(&self, outcome: &Outcome) -> Result<()> {
        check_same_axis("assays", self.sample_ids(), "outcome", outcome.sample_ids())
    }
}

/// Fail unless two sample axes have identical length and order.
pub fn check_same_axis(left_name: &str, left: &[String], right_name: &str, right: &[String]) -> Result<()> {
    if left.len() != right.len() {
        return Err(OmicsError::SampleMismatch(format!(
            "'{}' has {} samples but '{}' has {}",
            left_name,
            left.len(),
            right_name,
            right.len()
        )));
    }
    if let Some(pos) = left.iter().zip(right).position(|(a, b)| a != b) {
        return Err(OmicsError::SampleMismatch(format!(
            "'{}' and '{}' disagree at position {}: '{}' vs '{}'",
            left_name, right_name, pos, left[pos], right[pos]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ids: &[&str], n_features: usize) -> AssayTable {
        let rows: Vec<Vec<f64>> = (0..ids.len())
            .map(|i| (0..n_features).map(|j| (i * n_features + j) as f64).collect())
            .collect();
        AssayTable::from_rows(
            &rows,
            ids.iter().map(|s| s.to_string()).collect(),
            (0..n_features).map(|j| format!("f{}", j)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_aligned_blocks() {
        let ids = ["S1", "S2", "S3"];
        let multi = MultiAssay::new(vec![
            ("mrna".into(), table(&ids, 4)),
            ("protein".into(), table(&ids, 2)),
        ])
        .unwrap();
        assert_eq!(multi.n_blocks(), 2);
        assert_eq!(multi.n_samples(), 3);
        assert_eq!(multi.names(), vec!["mrna", "protein"]);
        assert_eq!(multi.get("protein").unwrap().n_features(), 2);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let result = MultiAssay::new(vec![
            ("a".into(), table(&["S1", "S2", "S3"], 2)),
            ("b".into(), table(&["S1", "S2"], 2)),
        ]);
        assert!(matches!(result, Err(OmicsError::SampleMismatch(_))));
    }

    #[test]
    fn test_order_mismatch_rejected() {
        let result = MultiAssay::new(vec![
            ("a".into(), table(&["S1", "S2", "S3"], 2)),
            ("b".into(), table(&["S1", "S3", "S2"], 2)),
        ]);
        match result {
            Err(OmicsError::SampleMismatch(msg)) => assert!(msg.contains("position 1")),
            other => panic!("expected alignment error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_block_name_rejected() {
        let ids = ["S1", "S2"];
        let result = MultiAssay::new(vec![("a".into(), table(&ids, 1)), ("a".into(), table(&ids, 1))]);
        assert!(matches!(result, Err(OmicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_outcome_alignment() {
        let ids = ["S1", "S2"];
        let multi = MultiAssay::new(vec![("a".into(), table(&ids, 2))]).unwrap();

        let good = Outcome::categorical(
            vec!["S1".into(), "S2".into()],
            vec!["x".into(), "y".into()],
        )
        .unwrap();
        assert!(multi.check_outcome(&good).is_ok());

        let swapped = Outcome::categorical(
            vec!["S2".into(), "S1".into()],
            vec!["x".into(), "y".into()],
        )
        .unwrap();
        assert!(multi.check_outcome(&swapped).is_err());
    }

    #[test]
    fn test_select_unknown_block() {
        let multi = MultiAssay::new(vec![("a".into(), table(&["S1"], 1))]).unwrap();
        assert!(matches!(
            multi.select(&["zzz".to_string()]),
            Err(OmicsError::UnknownBlock(_))
        ));
    }
}
