//! Feature-retention counts and loading-vector thresholding.

use crate::data::MultiAssay;
use crate::error::{OmicsError, Result};
use crate::normalize::count_varying_columns;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-block, per-component number of features to keep.
///
/// These counts are tuning inputs supplied by the caller; nothing here
/// searches for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeepX(pub BTreeMap<String, Vec<usize>>);

impl KeepX {
    /// Empty map: every block keeps all of its features.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add the counts for one block.
    pub fn with(mut self, block: &str, counts: &[usize]) -> Self {
        self.0.insert(block.to_string(), counts.to_vec());
        self
    }

    /// Counts for a block, if restricted.
    pub fn get(&self, block: &str) -> Option<&[usize]> {
        self.0.get(block).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve to a count per component for every block, in block order.
    ///
    /// Unrestricted blocks keep all features on every component. A count may
    /// not exceed the number of non-constant features of its block, since a
    /// constant feature always carries a zero loading.
    pub fn resolve(&self, assays: &MultiAssay, ncomp: usize) -> Result<Vec<Vec<usize>>> {
        for name in self.0.keys() {
            if assays.get(name).is_none() {
                return Err(OmicsError::UnknownBlock(name.clone()));
            }
        }

        assays
            .iter()
            .map(|(name, table)| {
                let n_features = table.n_features();
                match self.get(name) {
                    None => Ok(vec![n_features; ncomp]),
                    Some(counts) => {
                        if counts.len() != ncomp {
                            return Err(OmicsError::InvalidParameter(format!(
                                "keep counts for block '{}' have length {} but {} components were requested",
                                name,
                                counts.len(),
                                ncomp
                            )));
                        }
                        for &k in counts {
                            if k == 0 || k > n_features {
                                return Err(OmicsError::InvalidParameter(format!(
                                    "keep count {} for block '{}' must be between 1 and {}",
                                    k, name, n_features
                                )));
                            }
                        }
                        let varying = count_varying_columns(table.matrix());
                        if let Some(&k) = counts.iter().find(|&&k| k > varying) {
                            return Err(OmicsError::InvalidParameter(format!(
                                "keep count {} for block '{}' exceeds its {} non-constant features",
                                k, name, varying
                            )));
                        }
                        Ok(counts.to_vec())
                    }
                }
            })
            .collect()
    }
}

/// Soft-threshold a loading vector so that exactly `keep` entries survive.
///
/// The `keep` largest entries by magnitude are shrunk towards zero by the
/// largest discarded magnitude; the rest are set to zero. When a tie at the
/// boundary would shrink a kept entry to zero, kept entries are left
/// unshrunk instead. Ties in magnitude are broken by position.
pub fn soft_threshold_keep(a: &mut DVector<f64>, keep: usize) {
    let n = a.len();
    if keep >= n {
        return;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        a[j].abs()
            .partial_cmp(&a[i].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(i.cmp(&j))
    });

    let lambda = a[order[keep]].abs();
    let kept = &order[..keep];
    let shrink = kept.iter().all(|&i| a[i].abs() > lambda);

    let mut out = DVector::zeros(n);
    for &i in kept {
        out[i] = if shrink {
            a[i].signum() * (a[i].abs() - lambda)
        } else {
            a[i]
        };
    }
    *a = out;
}

/// Number of non-zero entries.
pub fn count_nonzero(values: impl IntoIterator<Item = f64>) -> usize {
    values.into_iter().filter(|v| *v != 0.0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AssayTable;

    fn assays() -> MultiAssay {
        let ids: Vec<String> = (1..=4).map(|i| format!("S{}", i)).collect();
        let block = |p: usize| {
            let rows: Vec<Vec<f64>> = (0..4).map(|i| (0..p).map(|j| (i + j) as f64).collect()).collect();
            AssayTable::from_rows(&rows, ids.clone(), (0..p).map(|j| format!("f{}", j)).collect())
                .unwrap()
        };
        MultiAssay::new(vec![("A".into(), block(5)), ("B".into(), block(3))]).unwrap()
    }

    #[test]
    fn test_threshold_keeps_exactly_k() {
        let mut a = DVector::from_vec(vec![0.1, -0.9, 0.4, 0.05, -0.3]);
        soft_threshold_keep(&mut a, 2);
        assert_eq!(count_nonzero(a.iter().copied()), 2);
        assert!(a[1] < 0.0);
        assert!(a[2] > 0.0);
        assert!((a[1] + 0.6).abs() < 1e-12);
        assert!((a[2] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_ties_do_not_drop_entries() {
        let mut a = DVector::from_vec(vec![0.5, 0.5, 0.5, 0.1]);
        soft_threshold_keep(&mut a, 2);
        assert_eq!(count_nonzero(a.iter().copied()), 2);
        assert_eq!(a[0], 0.5);
        assert_eq!(a[1], 0.5);
    }

    #[test]
    fn test_threshold_keep_all_is_noop() {
        let mut a = DVector::from_vec(vec![0.2, -0.1]);
        soft_threshold_keep(&mut a, 2);
        assert_eq!(a, DVector::from_vec(vec![0.2, -0.1]));
    }

    #[test]
    fn test_resolve_defaults_to_all_features() {
        let resolved = KeepX::new().with("A", &[2, 1]).resolve(&assays(), 2).unwrap();
        assert_eq!(resolved, vec![vec![2, 1], vec![3, 3]]);
    }

    #[test]
    fn test_resolve_rejects_bad_configs() {
        let multi = assays();
        let wrong_len = KeepX::new().with("A", &[2]).resolve(&multi, 2);
        assert!(matches!(wrong_len, Err(OmicsError::InvalidParameter(_))));

        let too_many = KeepX::new().with("B", &[4, 1]).resolve(&multi, 2);
        assert!(matches!(too_many, Err(OmicsError::InvalidParameter(_))));

        let zero = KeepX::new().with("B", &[0, 1]).resolve(&multi, 2);
        assert!(matches!(zero, Err(OmicsError::InvalidParameter(_))));

        let unknown = KeepX::new().with("Z", &[1, 1]).resolve(&multi, 2);
        assert!(matches!(unknown, Err(OmicsError::UnknownBlock(_))));
    }

    #[test]
    fn test_resolve_counts_only_varying_features() {
        let ids: Vec<String> = (1..=4).map(|i| format!("S{}", i)).collect();
        let rows: Vec<Vec<f64>> = (0..4)
            .map(|i| vec![i as f64, 7.0, (i * i) as f64, -1.0])
            .collect();
        let table = AssayTable::from_rows(&rows, ids, (0..4).map(|j| format!("f{}", j)).collect()).unwrap();
        let multi = MultiAssay::new(vec![("B".into(), table)]).unwrap();

        let too_many = KeepX::new().with("B", &[3, 3]).resolve(&multi, 2);
        assert!(matches!(too_many, Err(OmicsError::InvalidParameter(_))));
        assert_eq!(KeepX::new().with("B", &[2, 1]).resolve(&multi, 2).unwrap(), vec![vec![2, 1]]);
        assert_eq!(KeepX::new().resolve(&multi, 2).unwrap(), vec![vec![4, 4]]);
    }
}
