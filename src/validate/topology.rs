//! Topology and coordinate analysis for one layer.
//!
//! Produces the topology and coordinate sections of the per-layer
//! validation report: self-intersecting rings, pairwise overlaps, invalid
//! geometries, out-of-range coordinates, and implausible locations.

use geo::{Intersects, Line};

use crate::types::{CanonicalBoundary, CoordinateCheck, OverlapFinding, TopologyCheck};

use super::school::overlap_area_m2;

/// Topology analyzer for a set of same-layer boundaries.
#[derive(Debug, Clone, Default)]
pub struct TopologyValidator {
    /// Optional state bounding box (min_lon, min_lat, max_lon, max_lat)
    /// used for the suspicious-location check.
    state_bbox: Option<(f64, f64, f64, f64)>,
}

impl TopologyValidator {
    /// Analyzer with no location expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer that flags boundaries centered outside the state bbox.
    pub fn with_state_bbox(state_bbox: (f64, f64, f64, f64)) -> Self {
        Self {
            state_bbox: Some(state_bbox),
        }
    }

    /// Run the topology checks over a layer's boundaries.
    pub fn check(&self, boundaries: &[CanonicalBoundary]) -> (TopologyCheck, CoordinateCheck) {
        let mut topology = TopologyCheck::default();
        let mut coordinates = CoordinateCheck::default();

        for boundary in boundaries {
            match boundary.geometry.validate() {
                Ok(()) => {}
                Err(crate::types::GeometryError::OutOfBounds { .. }) => {
                    coordinates.out_of_range.push(boundary.id.clone());
                }
                Err(crate::types::GeometryError::Empty) => {
                    coordinates.null_geometries.push(boundary.id.clone());
                }
                Err(_) => {
                    topology.invalid_geometries.push(boundary.id.clone());
                }
            }

            if boundary
                .geometry
                .rings()
                .any(ring_self_intersects)
            {
                topology.self_intersections.push(boundary.id.clone());
            }

            if let (Some(state_bbox), Some(bbox)) = (self.state_bbox, boundary.geometry.bbox()) {
                let center = ((bbox.0 + bbox.2) / 2.0, (bbox.1 + bbox.3) / 2.0);
                let (min_lon, min_lat, max_lon, max_lat) = state_bbox;
                if center.0 < min_lon || center.0 > max_lon || center.1 < min_lat || center.1 > max_lat
                {
                    coordinates.suspicious_locations.push(boundary.id.clone());
                }
            }
        }

        // Pairwise overlap within the layer.
        for (i, a) in boundaries.iter().enumerate() {
            for b in &boundaries[i + 1..] {
                if let Some(area) = overlap_area_m2(a, b) {
                    topology
                        .overlaps
                        .push(OverlapFinding::new(a.id.clone(), b.id.clone(), area));
                }
            }
        }
        topology
            .overlaps
            .sort_by(|a, b| (&a.id_a, &a.id_b).cmp(&(&b.id_a, &b.id_b)));

        (topology, coordinates)
    }
}

/// O(n²) segment test: a ring self-intersects when two non-adjacent
/// segments touch. Adequate for district-scale rings.
fn ring_self_intersects(ring: &[[f64; 2]]) -> bool {
    if ring.len() < 5 {
        // A triangle (4 closed vertices) cannot self-intersect.
        return false;
    }
    let segments: Vec<Line<f64>> = ring
        .windows(2)
        .map(|w| {
            Line::new(
                geo::Coord { x: w[0][0], y: w[0][1] },
                geo::Coord { x: w[1][0], y: w[1][1] },
            )
        })
        .collect();
    let n = segments.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // Skip the closing segment's adjacency with the first.
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments[i].intersects(&segments[j]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AuthorityLevel, BoundaryGeometry, BoundaryLevel, LegalStatus, Provenance,
    };
    use chrono::Utc;

    fn boundary(id: &str, rings: Vec<Vec<[f64; 2]>>) -> CanonicalBoundary {
        CanonicalBoundary {
            id: id.to_string(),
            name: format!("District {id}"),
            level: BoundaryLevel::District,
            geometry: BoundaryGeometry::from_rings(vec![rings]),
            provenance: Provenance {
                provider: "US Census Bureau".into(),
                url: "https://example.test/x.zip".into(),
                vintage: 2024,
                license: "public-domain".into(),
                retrieved_at: Utc::now(),
                content_sha256: "01".repeat(32),
                authority_level: AuthorityLevel::Federal,
                legal_status: LegalStatus::Enacted,
                coordinate_system: "EPSG:4326".into(),
            },
        }
    }

    fn square(id: &str, x0: f64, y0: f64, size: f64) -> CanonicalBoundary {
        boundary(
            id,
            vec![vec![
                [x0, y0],
                [x0 + size, y0],
                [x0 + size, y0 + size],
                [x0, y0 + size],
                [x0, y0],
            ]],
        )
    }

    #[test]
    fn test_clean_layer() {
        let (topology, coordinates) = TopologyValidator::new().check(&[
            square("5501", -90.0, 43.0, 0.4),
            square("5502", -89.5, 43.0, 0.4),
        ]);
        assert!(topology.self_intersections.is_empty());
        assert!(topology.overlaps.is_empty());
        assert!(topology.invalid_geometries.is_empty());
        assert!(coordinates.out_of_range.is_empty());
    }

    #[test]
    fn test_bowtie_ring_self_intersects() {
        // Figure-eight: segments (0,0)→(1,1) and (1,0)→(0,1) cross.
        let bowtie = boundary(
            "5501",
            vec![vec![
                [0.0, 0.0],
                [1.0, 1.0],
                [1.0, 0.0],
                [0.0, 1.0],
                [0.0, 0.0],
            ]],
        );
        let (topology, _) = TopologyValidator::new().check(&[bowtie]);
        assert_eq!(topology.self_intersections, vec!["5501".to_string()]);
    }

    #[test]
    fn test_overlap_detected_and_sorted() {
        let (topology, _) = TopologyValidator::new().check(&[
            square("5502", -89.8, 43.0, 0.5),
            square("5501", -90.0, 43.0, 0.5),
        ]);
        assert_eq!(topology.overlaps.len(), 1);
        assert_eq!(topology.overlaps[0].id_a, "5501");
        assert_eq!(topology.overlaps[0].id_b, "5502");
    }

    #[test]
    fn test_out_of_range_coordinates_reported() {
        let bad = boundary(
            "5509",
            vec![vec![
                [-190.0, 43.0],
                [-189.0, 43.0],
                [-189.0, 44.0],
                [-190.0, 44.0],
                [-190.0, 43.0],
            ]],
        );
        let (_, coordinates) = TopologyValidator::new().check(&[bad]);
        assert_eq!(coordinates.out_of_range, vec!["5509".to_string()]);
    }

    #[test]
    fn test_suspicious_location_flagged() {
        let validator = TopologyValidator::with_state_bbox((-92.9, 42.5, -86.2, 47.3));
        // A "Wisconsin" district centered in the Gulf of Mexico.
        let (_, coordinates) = validator.check(&[square("5501", -90.0, 25.0, 0.5)]);
        assert_eq!(coordinates.suspicious_locations, vec!["5501".to_string()]);
    }
}
