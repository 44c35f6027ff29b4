//! Per-layer validation reports.

use serde::{Deserialize, Serialize};

/// Count section of a validation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountCheck {
    /// Registry expected count, when known.
    pub expected: Option<u32>,
    /// Observed record count.
    pub actual: u32,
    /// Ids expected but absent.
    pub missing_ids: Vec<String>,
    /// Ids present but not expected.
    pub extra_ids: Vec<String>,
}

impl CountCheck {
    /// Absolute diff between expected and actual, when expected is known.
    pub fn diff(&self) -> Option<i64> {
        self.expected
            .map(|e| i64::from(self.actual) - i64::from(e))
    }
}

/// One pairwise overlap finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapFinding {
    /// First boundary id (lexicographically smaller).
    pub id_a: String,
    /// Second boundary id.
    pub id_b: String,
    /// Intersection area in square meters.
    pub area_m2: f64,
}

impl OverlapFinding {
    /// Create with canonical (sorted) id ordering.
    pub fn new(id_a: String, id_b: String, area_m2: f64) -> Self {
        let (id_a, id_b) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
        Self { id_a, id_b, area_m2 }
    }
}

/// Topology section of a validation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyCheck {
    /// Ids whose rings self-intersect.
    pub self_intersections: Vec<String>,
    /// Pairwise overlaps with positive area.
    pub overlaps: Vec<OverlapFinding>,
    /// Number of coverage gaps detected.
    pub gap_count: u32,
    /// Ids whose geometry failed basic validity.
    pub invalid_geometries: Vec<String>,
}

/// Coordinate sanity section of a validation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateCheck {
    /// Ids with coordinates outside WGS84 bounds.
    pub out_of_range: Vec<String>,
    /// Ids with null/empty geometry.
    pub null_geometries: Vec<String>,
    /// Ids centered somewhere implausible for the state.
    pub suspicious_locations: Vec<String>,
}

/// Full per-layer validation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Layer wire code.
    pub layer: String,
    /// State FIPS code.
    pub state_fips: String,
    /// Count section.
    pub counts: CountCheck,
    /// Topology section.
    pub topology: TopologyCheck,
    /// Coordinate section.
    pub coordinates: CoordinateCheck,
    /// Overall quality score in [0, 100].
    pub quality_score: u8,
    /// Human-readable summary line.
    pub summary: String,
}

impl ValidationReport {
    /// Compute the quality score from the section findings.
    ///
    /// Starts at 100; subtracts 15 per structural defect class present
    /// (invalid geometry, self-intersection, out-of-range), 10 for any
    /// overlap, 5 per count mismatch unit up to 25.
    pub fn score(counts: &CountCheck, topology: &TopologyCheck, coords: &CoordinateCheck) -> u8 {
        let mut score: i32 = 100;
        if !topology.invalid_geometries.is_empty() {
            score -= 15;
        }
        if !topology.self_intersections.is_empty() {
            score -= 15;
        }
        if !coords.out_of_range.is_empty() || !coords.null_geometries.is_empty() {
            score -= 15;
        }
        if !topology.overlaps.is_empty() {
            score -= 10;
        }
        if let Some(diff) = counts.diff() {
            score -= (diff.unsigned_abs().min(5) as i32) * 5;
        }
        score.clamp(0, 100) as u8
    }
}
