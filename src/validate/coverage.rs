//! State coverage validation.
//!
//! Unions every boundary in a layer and measures how much of the state
//! polygon the union covers. Coverage below 0.95 is a finding; whether it
//! halts the build is up to the halt gates.

use geo::{BooleanOps, GeodesicArea, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::types::CanonicalBoundary;

/// Minimum acceptable share of the state polygon covered.
pub const MIN_COVERAGE: f64 = 0.95;

/// Outcome of a coverage check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageFinding {
    /// covered_area / state_area, in [0, 1].
    pub coverage: f64,
    /// Area of the boundary union clipped to the state, m².
    pub covered_area_m2: f64,
    /// Area of the state polygon, m².
    pub state_area_m2: f64,
    /// Area of the symmetric difference, m².
    pub symmetric_difference_m2: f64,
}

impl CoverageFinding {
    /// Whether coverage meets the minimum.
    pub fn passes(&self) -> bool {
        self.coverage >= MIN_COVERAGE
    }
}

/// Coverage analyzer for one state polygon.
pub struct CoverageValidator {
    state_polygon: MultiPolygon<f64>,
}

impl CoverageValidator {
    /// Create a validator for a state polygon.
    pub fn new(state_polygon: MultiPolygon<f64>) -> Self {
        Self { state_polygon }
    }

    /// Measure coverage of the state by the union of `boundaries`.
    pub fn check(&self, boundaries: &[CanonicalBoundary]) -> CoverageFinding {
        let state_area_m2 = self.state_polygon.geodesic_area_unsigned();

        let mut union: Option<MultiPolygon<f64>> = None;
        for boundary in boundaries {
            let mp = boundary.geometry.to_multi_polygon();
            union = Some(match union {
                None => mp,
                Some(acc) => acc.union(&mp),
            });
        }

        let Some(union) = union else {
            return CoverageFinding {
                coverage: 0.0,
                covered_area_m2: 0.0,
                state_area_m2,
                symmetric_difference_m2: state_area_m2,
            };
        };

        let covered = union.intersection(&self.state_polygon);
        let covered_area_m2 = covered.geodesic_area_unsigned();
        let symmetric_difference_m2 = union.xor(&self.state_polygon).geodesic_area_unsigned();
        let coverage = if state_area_m2 > 0.0 {
            (covered_area_m2 / state_area_m2).clamp(0.0, 1.0)
        } else {
            0.0
        };

        CoverageFinding {
            coverage,
            covered_area_m2,
            state_area_m2,
            symmetric_difference_m2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AuthorityLevel, BoundaryGeometry, BoundaryLevel, LegalStatus, Provenance,
    };
    use chrono::Utc;
    use geo::{polygon, Polygon};

    fn state_square() -> MultiPolygon<f64> {
        let poly: Polygon<f64> = polygon![
            (x: -90.0, y: 43.0),
            (x: -89.0, y: 43.0),
            (x: -89.0, y: 44.0),
            (x: -90.0, y: 44.0),
            (x: -90.0, y: 43.0),
        ];
        MultiPolygon(vec![poly])
    }

    fn strip(id: &str, x0: f64, width: f64) -> CanonicalBoundary {
        let ring = vec![
            [x0, 43.0],
            [x0 + width, 43.0],
            [x0 + width, 44.0],
            [x0, 44.0],
            [x0, 43.0],
        ];
        CanonicalBoundary {
            id: id.to_string(),
            name: format!("Strip {id}"),
            level: BoundaryLevel::District,
            geometry: BoundaryGeometry::from_rings(vec![vec![ring]]),
            provenance: Provenance {
                provider: "US Census Bureau".into(),
                url: "https://example.test/x.zip".into(),
                vintage: 2024,
                license: "public-domain".into(),
                retrieved_at: Utc::now(),
                content_sha256: "ef".repeat(32),
                authority_level: AuthorityLevel::Federal,
                legal_status: LegalStatus::Enacted,
                coordinate_system: "EPSG:4326".into(),
            },
        }
    }

    #[test]
    fn test_full_coverage_passes() {
        let validator = CoverageValidator::new(state_square());
        let finding = validator.check(&[
            strip("5501", -90.0, 0.5),
            strip("5502", -89.5, 0.5),
        ]);
        assert!(finding.coverage > 0.999, "coverage = {}", finding.coverage);
        assert!(finding.passes());
    }

    #[test]
    fn test_gap_below_threshold_fails() {
        // Strips cover 94% of the state's width: 0.949-ish coverage after
        // geodesic distortion, below the 0.95 floor.
        let validator = CoverageValidator::new(state_square());
        let finding = validator.check(&[
            strip("5501", -90.0, 0.5),
            strip("5502", -89.5, 0.44),
        ]);
        assert!(finding.coverage < MIN_COVERAGE, "coverage = {}", finding.coverage);
        assert!(!finding.passes());
        assert!(finding.symmetric_difference_m2 > 0.0);
    }

    #[test]
    fn test_no_boundaries_is_zero_coverage() {
        let validator = CoverageValidator::new(state_square());
        let finding = validator.check(&[]);
        assert_eq!(finding.coverage, 0.0);
        assert!(!finding.passes());
    }

    #[test]
    fn test_boundaries_outside_state_do_not_count() {
        let validator = CoverageValidator::new(state_square());
        // A strip entirely west of the state.
        let finding = validator.check(&[strip("5501", -92.0, 0.5)]);
        assert!(finding.coverage < 0.01);
    }
}
