//! School-district multi-system overlap rules.
//!
//! Each state carries up to three boundary systems: unified, elementary,
//! secondary. Overlap with positive area is forbidden within a system and
//! between unified and either specialized system. Elementary↔secondary
//! overlap is forbidden except in dual-system states, where the two systems
//! intentionally cover the same territory. New York and Hawaii allow
//! unified-with-specialized overlaps.

use geo::{BooleanOps, GeodesicArea};
use serde::{Deserialize, Serialize};

use crate::types::{CanonicalBoundary, OverlapFinding};

/// States whose elementary and secondary systems are intentionally
/// separate: CT IL ME MA MT NH NJ RI VT.
pub const DUAL_SYSTEM_STATE_FIPS: [&str; 9] =
    ["09", "17", "23", "25", "30", "33", "34", "44", "50"];

/// States where unified districts legitimately overlap specialized ones:
/// NY (city specialized districts), HI (single statewide system quirks).
pub const UNIFIED_OVERLAP_EXCEPTION_FIPS: [&str; 2] = ["36", "15"];

/// Share of the smaller geometry's area below which an intersection is
/// treated as shared-boundary digitization noise, not overlap.
const OVERLAP_NOISE_FLOOR: f64 = 1e-9;

/// School system a boundary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolSystem {
    /// Unified (K-12) district.
    Unified,
    /// Elementary district.
    Elementary,
    /// Secondary district.
    Secondary,
}

/// The three boundary systems for one state.
#[derive(Debug, Clone, Default)]
pub struct SchoolSystemSets {
    /// Unified districts.
    pub unified: Vec<CanonicalBoundary>,
    /// Elementary districts.
    pub elementary: Vec<CanonicalBoundary>,
    /// Secondary districts.
    pub secondary: Vec<CanonicalBoundary>,
}

/// One forbidden-overlap finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolFinding {
    /// System of the first boundary.
    pub system_a: SchoolSystem,
    /// System of the second boundary.
    pub system_b: SchoolSystem,
    /// The overlap itself.
    pub overlap: OverlapFinding,
}

/// Analyzer for the multi-system overlap rules.
pub struct SchoolSystemValidator {
    state_fips: String,
}

impl SchoolSystemValidator {
    /// Create a validator for one state.
    pub fn new(state_fips: impl Into<String>) -> Self {
        Self {
            state_fips: state_fips.into(),
        }
    }

    /// Whether this state runs intentionally separate elementary and
    /// secondary systems.
    pub fn is_dual_system(&self) -> bool {
        DUAL_SYSTEM_STATE_FIPS.contains(&self.state_fips.as_str())
    }

    /// Whether unified-with-specialized overlap is allowed here.
    pub fn allows_unified_overlap(&self) -> bool {
        UNIFIED_OVERLAP_EXCEPTION_FIPS.contains(&self.state_fips.as_str())
    }

    /// Compute all forbidden overlaps across the three systems.
    ///
    /// Findings are sorted by (id_a, id_b) for determinism.
    pub fn check(&self, sets: &SchoolSystemSets) -> Vec<SchoolFinding> {
        use SchoolSystem::{Elementary, Secondary, Unified};

        let mut findings = Vec::new();

        // Within-system overlap is always forbidden.
        findings.extend(self.pairwise(&sets.unified, &sets.unified, Unified, Unified));
        findings.extend(self.pairwise(&sets.elementary, &sets.elementary, Elementary, Elementary));
        findings.extend(self.pairwise(&sets.secondary, &sets.secondary, Secondary, Secondary));

        // Unified against specialized, unless the state is excepted.
        if !self.allows_unified_overlap() {
            findings.extend(self.pairwise(&sets.unified, &sets.elementary, Unified, Elementary));
            findings.extend(self.pairwise(&sets.unified, &sets.secondary, Unified, Secondary));
        }

        // Elementary against secondary, unless dual-system.
        if !self.is_dual_system() {
            findings.extend(self.pairwise(
                &sets.elementary,
                &sets.secondary,
                Elementary,
                Secondary,
            ));
        }

        findings.sort_by(|a, b| {
            (&a.overlap.id_a, &a.overlap.id_b).cmp(&(&b.overlap.id_a, &b.overlap.id_b))
        });
        findings
    }

    fn pairwise(
        &self,
        set_a: &[CanonicalBoundary],
        set_b: &[CanonicalBoundary],
        system_a: SchoolSystem,
        system_b: SchoolSystem,
    ) -> Vec<SchoolFinding> {
        let same_set = system_a == system_b;
        let mut findings = Vec::new();
        for (i, a) in set_a.iter().enumerate() {
            let start = if same_set { i + 1 } else { 0 };
            for b in &set_b[start.min(set_b.len())..] {
                if a.id == b.id {
                    continue;
                }
                if let Some(area) = overlap_area_m2(a, b) {
                    findings.push(SchoolFinding {
                        system_a,
                        system_b,
                        overlap: OverlapFinding::new(a.id.clone(), b.id.clone(), area),
                    });
                }
            }
        }
        findings
    }
}

/// Positive-area intersection between two boundaries, above the noise
/// floor; None when they do not meaningfully overlap.
pub fn overlap_area_m2(a: &CanonicalBoundary, b: &CanonicalBoundary) -> Option<f64> {
    // Cheap bbox rejection before the boolean op.
    let (a_min_lon, a_min_lat, a_max_lon, a_max_lat) = a.geometry.bbox()?;
    let (b_min_lon, b_min_lat, b_max_lon, b_max_lat) = b.geometry.bbox()?;
    if a_max_lon < b_min_lon || b_max_lon < a_min_lon || a_max_lat < b_min_lat || b_max_lat < a_min_lat
    {
        return None;
    }

    let mp_a = a.geometry.to_multi_polygon();
    let mp_b = b.geometry.to_multi_polygon();
    let intersection = mp_a.intersection(&mp_b);
    let area = intersection.geodesic_area_unsigned();
    let floor = OVERLAP_NOISE_FLOOR * a.geometry.area_m2().min(b.geometry.area_m2());
    (area > floor && area > 0.0).then_some(area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AuthorityLevel, BoundaryGeometry, BoundaryLevel, LegalStatus, Provenance,
    };
    use chrono::Utc;

    fn school_boundary(id: &str, x0: f64, y0: f64, size: f64) -> CanonicalBoundary {
        let ring = vec![
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
            [x0, y0],
        ];
        CanonicalBoundary {
            id: id.to_string(),
            name: format!("School District {id}"),
            level: BoundaryLevel::SchoolDistrict,
            geometry: BoundaryGeometry::from_rings(vec![vec![ring]]),
            provenance: Provenance {
                provider: "US Census Bureau".into(),
                url: "https://example.test/schools.zip".into(),
                vintage: 2024,
                license: "public-domain".into(),
                retrieved_at: Utc::now(),
                content_sha256: "cd".repeat(32),
                authority_level: AuthorityLevel::Federal,
                legal_status: LegalStatus::Enacted,
                coordinate_system: "EPSG:4326".into(),
            },
        }
    }

    #[test]
    fn test_disjoint_sets_are_clean() {
        let sets = SchoolSystemSets {
            unified: vec![
                school_boundary("5500001", -90.0, 43.0, 0.4),
                school_boundary("5500002", -89.5, 43.0, 0.4),
            ],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("55").check(&sets);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_unified_unified_overlap_reported() {
        let sets = SchoolSystemSets {
            unified: vec![
                school_boundary("5500001", -90.0, 43.0, 0.5),
                school_boundary("5500002", -89.8, 43.0, 0.5), // overlaps by 0.3°
            ],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("55").check(&sets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].system_a, SchoolSystem::Unified);
        assert!(findings[0].overlap.area_m2 > 0.0);
    }

    #[test]
    fn test_elementary_secondary_forbidden_outside_dual_system() {
        // Wisconsin ("55") is not a dual-system state.
        let sets = SchoolSystemSets {
            elementary: vec![school_boundary("5500010", -90.0, 43.0, 0.5)],
            secondary: vec![school_boundary("5500020", -90.0, 43.0, 0.5)],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("55").check(&sets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].system_a, SchoolSystem::Elementary);
        assert_eq!(findings[0].system_b, SchoolSystem::Secondary);
    }

    #[test]
    fn test_elementary_secondary_expected_in_dual_system_state() {
        // Illinois ("17") is dual-system; identical territory is fine.
        let sets = SchoolSystemSets {
            elementary: vec![school_boundary("1700010", -90.0, 43.0, 0.5)],
            secondary: vec![school_boundary("1700020", -90.0, 43.0, 0.5)],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("17").check(&sets);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_unified_specialized_allowed_in_new_york() {
        let sets = SchoolSystemSets {
            unified: vec![school_boundary("3600001", -74.2, 40.6, 0.5)],
            elementary: vec![school_boundary("3600010", -74.2, 40.6, 0.5)],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("36").check(&sets);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_unified_specialized_forbidden_elsewhere() {
        let sets = SchoolSystemSets {
            unified: vec![school_boundary("5500001", -90.0, 43.0, 0.5)],
            elementary: vec![school_boundary("5500010", -90.0, 43.0, 0.5)],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("55").check(&sets);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_shared_boundary_is_not_overlap() {
        // Two squares sharing an edge: intersection has zero area.
        let sets = SchoolSystemSets {
            unified: vec![
                school_boundary("5500001", -90.0, 43.0, 0.5),
                school_boundary("5500002", -89.5, 43.0, 0.5),
            ],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("55").check(&sets);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_findings_sorted_for_determinism() {
        let sets = SchoolSystemSets {
            unified: vec![
                school_boundary("5500003", -90.0, 43.0, 0.5),
                school_boundary("5500001", -89.9, 43.0, 0.5),
                school_boundary("5500002", -89.8, 43.0, 0.5),
            ],
            ..Default::default()
        };
        let findings = SchoolSystemValidator::new("55").check(&sets);
        let pairs: Vec<_> = findings
            .iter()
            .map(|f| (f.overlap.id_a.clone(), f.overlap.id_b.clone()))
            .collect();
        let mut sorted = pairs.clone();
        sorted.sort();
        assert_eq!(pairs, sorted);
    }
}
