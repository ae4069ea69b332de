//! Normalization of heterogeneous sample identifiers.

use crate::error::{OmicsError, Result};
use regex::Regex;

/// Extracts a canonical sample key from composite identifiers.
///
/// The pattern must contain exactly one capture group. Identifiers the
/// pattern does not match are returned trimmed but otherwise unchanged, so
/// already-normalized keys pass through untouched.
#[derive(Debug, Clone)]
pub struct SampleIdPattern {
    regex: Regex,
}

impl SampleIdPattern {
    /// Compile a pattern with a single capture group.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)?;
        // captures_len counts the implicit whole-match group
        if regex.captures_len() != 2 {
            return Err(OmicsError::InvalidParameter(format!(
                "sample ID pattern '{}' must have exactly one capture group",
                pattern
            )));
        }
        Ok(Self { regex })
    }

    /// Participant code of a TCGA barcode: `TCGA-A2-A0T2-01A` gives `A0T2`.
    pub fn tcga_participant() -> Self {
        Self {
            regex: Regex::new(r"^TCGA-[A-Za-z0-9]{2}-([A-Za-z0-9]{4})(?:-.*)?$")
                .expect("static pattern"),
        }
    }

    /// Last token after `separator`: `cohort-7-P012` with `-` gives `P012`.
    pub fn suffix_after(separator: char) -> Result<Self> {
        let sep = regex::escape(&separator.to_string());
        Self::new(&format!(r"^.*{}([^{}]+)$", sep, sep))
    }

    /// Identity normalization (trim only).
    pub fn identity() -> Self {
        Self {
            regex: Regex::new(r"^(.*)$").expect("static pattern"),
        }
    }

    /// Source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Normalize one identifier.
    pub fn normalize(&self, id: &str) -> String {
        let trimmed = id.trim();
        match self.regex.captures(trimmed).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().to_string(),
            None => trimmed.to_string(),
        }
    }

    /// Normalize a list of identifiers.
    pub fn normalize_all(&self, ids: &[String]) -> Vec<String> {
        ids.iter().map(|id| self.normalize(id)).collect()
    }
}

impl Default for SampleIdPattern {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcga_participant() {
        let pattern = SampleIdPattern::tcga_participant();
        assert_eq!(pattern.normalize("TCGA-A2-A0T2"), "A0T2");
        assert_eq!(pattern.normalize("TCGA-A2-A0T2-01A-11R-A084-07"), "A0T2");
        assert_eq!(pattern.normalize(" TCGA-BH-A18V "), "A18V");
        assert_eq!(pattern.normalize("A0T2"), "A0T2");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let patterns = vec![
            SampleIdPattern::tcga_participant(),
            SampleIdPattern::suffix_after('-').unwrap(),
            SampleIdPattern::suffix_after('_').unwrap(),
            SampleIdPattern::identity(),
        ];
        let ids = [
            "TCGA-A2-A0T2-01A",
            "TCGA-E2-A15K",
            "H045_CLL",
            "patient-17-b",
            "A0T2",
            "  S10 ",
            "",
        ];
        for pattern in &patterns {
            for id in &ids {
                let once = pattern.normalize(id);
                let twice = pattern.normalize(&once);
                assert_eq!(once, twice, "pattern {} on '{}'", pattern.as_str(), id);
            }
        }
    }

    #[test]
    fn test_suffix_after() {
        let pattern = SampleIdPattern::suffix_after('-').unwrap();
        assert_eq!(pattern.normalize("cohort-7-P012"), "P012");
        assert_eq!(pattern.normalize("P012"), "P012");
    }

    #[test]
    fn test_pattern_needs_one_group() {
        assert!(SampleIdPattern::new(r"^TCGA-.*$").is_err());
        assert!(SampleIdPattern::new(r"^(a)(b)$").is_err());
        assert!(SampleIdPattern::new(r"([").is_err());
    }
}
