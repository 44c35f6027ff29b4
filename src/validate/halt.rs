//! Halt gates.
//!
//! A gate maps a class of validation finding to either a hard stop
//! ([`crate::error::AtlasError::ValidationHalted`]) or a warning the build
//! carries in its report. Gates are configured per build.

use tracing::warn;

use crate::config::ValidationConfig;
use crate::error::AtlasError;
use crate::types::{CoordinateCheck, TopologyCheck};

use super::counts::CountFinding;
use super::coverage::CoverageFinding;
use super::school::SchoolFinding;

/// Configurable halt gates for one build.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaltGates {
    topology: bool,
    completeness: bool,
    coordinates: bool,
    overlap: bool,
    coverage: bool,
    count_mismatch: bool,
}

impl HaltGates {
    /// Gates from the validation config.
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            topology: config.halt_on_topology_error,
            completeness: config.halt_on_completeness_error,
            coordinates: config.halt_on_coordinate_error,
            overlap: config.halt_on_overlap,
            coverage: config.halt_on_coverage,
            count_mismatch: config.halt_on_count_mismatch,
        }
    }

    /// Gates that never halt (report-only builds).
    pub fn none() -> Self {
        Self::default()
    }

    /// Gates that always halt (strictest builds).
    pub fn all() -> Self {
        Self {
            topology: true,
            completeness: true,
            coordinates: true,
            overlap: true,
            coverage: true,
            count_mismatch: true,
        }
    }

    /// Apply the topology and coordinate gates to a layer's findings.
    pub fn check_topology(
        &self,
        layer: &str,
        topology: &TopologyCheck,
        coordinates: &CoordinateCheck,
    ) -> Result<(), AtlasError> {
        let defects =
            topology.self_intersections.len() + topology.invalid_geometries.len();
        if defects > 0 {
            if self.topology {
                return Err(AtlasError::ValidationHalted {
                    gate: "halt_on_topology",
                    detail: format!("{layer}: {defects} topology defects"),
                });
            }
            warn!(layer, defects, "topology defects (gate closed)");
        }

        if !topology.overlaps.is_empty() && self.overlap {
            return Err(AtlasError::ValidationHalted {
                gate: "halt_on_overlap",
                detail: format!("{layer}: {} overlapping pairs", topology.overlaps.len()),
            });
        }

        let coordinate_defects =
            coordinates.out_of_range.len() + coordinates.null_geometries.len();
        if coordinate_defects > 0 {
            if self.coordinates {
                return Err(AtlasError::ValidationHalted {
                    gate: "halt_on_coordinates",
                    detail: format!("{layer}: {coordinate_defects} coordinate defects"),
                });
            }
            warn!(layer, coordinate_defects, "coordinate defects (gate closed)");
        }
        Ok(())
    }

    /// Apply the count gate: a relative diff over 10% halts when enabled.
    pub fn check_count(&self, layer: &str, finding: &CountFinding) -> Result<(), AtlasError> {
        if finding.exceeds_halt_threshold() {
            if self.count_mismatch {
                if let CountFinding::Mismatch {
                    expected,
                    actual,
                    relative_pct,
                } = finding
                {
                    return Err(AtlasError::ValidationHalted {
                        gate: "halt_on_count_mismatch",
                        detail: format!(
                            "{layer}: expected {expected}, got {actual} ({relative_pct:.1}% diff)"
                        ),
                    });
                }
            }
            warn!(layer, ?finding, "count mismatch over threshold (gate closed)");
        } else if self.completeness {
            if let CountFinding::Mismatch {
                expected, actual, ..
            } = finding
            {
                return Err(AtlasError::ValidationHalted {
                    gate: "halt_on_completeness",
                    detail: format!("{layer}: expected {expected}, got {actual}"),
                });
            }
        }
        Ok(())
    }

    /// Apply the coverage gate.
    pub fn check_coverage(
        &self,
        state_fips: &str,
        finding: &CoverageFinding,
    ) -> Result<(), AtlasError> {
        if !finding.passes() {
            if self.coverage {
                return Err(AtlasError::ValidationHalted {
                    gate: "halt_on_coverage",
                    detail: format!(
                        "state {state_fips}: coverage {:.4} below 0.95",
                        finding.coverage
                    ),
                });
            }
            warn!(state_fips, coverage = finding.coverage, "low coverage (gate closed)");
        }
        Ok(())
    }

    /// Apply the overlap gate to school-system findings.
    pub fn check_school(
        &self,
        state_fips: &str,
        findings: &[SchoolFinding],
    ) -> Result<(), AtlasError> {
        if !findings.is_empty() && self.overlap {
            return Err(AtlasError::ValidationHalted {
                gate: "halt_on_overlap",
                detail: format!(
                    "state {state_fips}: {} forbidden school-system overlaps",
                    findings.len()
                ),
            });
        }
        Ok(())
    }
}
