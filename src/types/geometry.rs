//! Boundary geometry wrapper.
//!
//! Canonical records store geometry as a `geo::MultiPolygon<f64>` in
//! EPSG:4326. Plain polygons are stored as single-member multis so the rest
//! of the kernel handles one shape.

use geo::{
    BoundingRect, Contains, GeodesicArea, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};

/// Error raised when a geometry violates WGS84 invariants.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeometryError {
    /// A ring has fewer than 4 vertices after closure.
    #[error("Ring with {0} vertices (minimum 4)")]
    DegenerateRing(usize),
    /// A coordinate is outside lon [-180, 180] / lat [-90, 90].
    #[error("Coordinate out of WGS84 bounds: ({lon}, {lat})")]
    OutOfBounds {
        /// Offending longitude.
        lon: f64,
        /// Offending latitude.
        lat: f64,
    },
    /// The geometry has no rings at all.
    #[error("Empty geometry")]
    Empty,
}

/// Polygon or multi-polygon geometry in EPSG:4326.
///
/// Serialized as GeoJSON-shaped nested position arrays so persisted
/// boundaries remain readable by standard tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryGeometry {
    /// Rings per polygon: `polygons[p][r]` is ring `r` of polygon `p`,
    /// ring 0 the exterior, each ring a closed `[lon, lat]` sequence.
    polygons: Vec<Vec<Vec<[f64; 2]>>>,
}

impl BoundaryGeometry {
    /// Build directly from nested position arrays.
    ///
    /// `polygons[p][r]` is ring `r` of polygon `p`, ring 0 the exterior.
    /// No validation is performed here; call [`Self::validate`].
    pub fn from_rings(polygons: Vec<Vec<Vec<[f64; 2]>>>) -> Self {
        Self { polygons }
    }

    /// Build from a `geo` multi-polygon.
    pub fn from_multi_polygon(mp: &MultiPolygon<f64>) -> Self {
        let polygons = mp
            .0
            .iter()
            .map(|poly| {
                let mut rings: Vec<Vec<[f64; 2]>> = Vec::with_capacity(1 + poly.interiors().len());
                rings.push(ring_positions(poly.exterior()));
                for interior in poly.interiors() {
                    rings.push(ring_positions(interior));
                }
                rings
            })
            .collect();
        Self { polygons }
    }

    /// Build from a single `geo` polygon.
    pub fn from_polygon(poly: &Polygon<f64>) -> Self {
        Self::from_multi_polygon(&MultiPolygon(vec![poly.clone()]))
    }

    /// Convert to a `geo` multi-polygon for spatial operations.
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        let polys = self
            .polygons
            .iter()
            .map(|rings| {
                let exterior = positions_ring(rings.first().map(Vec::as_slice).unwrap_or(&[]));
                let interiors = rings
                    .iter()
                    .skip(1)
                    .map(|r| positions_ring(r))
                    .collect::<Vec<_>>();
                Polygon::new(exterior, interiors)
            })
            .collect();
        MultiPolygon(polys)
    }

    /// Number of member polygons.
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Iterate all rings as position slices.
    pub fn rings(&self) -> impl Iterator<Item = &[[f64; 2]]> {
        self.polygons.iter().flat_map(|p| p.iter().map(Vec::as_slice))
    }

    /// Iterate rings grouped by member polygon.
    pub fn rings_by_polygon(&self) -> impl Iterator<Item = &Vec<Vec<[f64; 2]>>> {
        self.polygons.iter()
    }

    /// Total vertex count across all rings.
    pub fn vertex_count(&self) -> usize {
        self.rings().map(<[[f64; 2]]>::len).sum()
    }

    /// Validate ring cardinality and WGS84 bounds.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.polygons.is_empty() {
            return Err(GeometryError::Empty);
        }
        for ring in self.rings() {
            if ring.len() < 4 {
                return Err(GeometryError::DegenerateRing(ring.len()));
            }
            for &[lon, lat] in ring {
                if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                    return Err(GeometryError::OutOfBounds { lon, lat });
                }
            }
        }
        Ok(())
    }

    /// Axis-aligned bounding box as (min_lon, min_lat, max_lon, max_lat).
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        let rect: Rect<f64> = self.to_multi_polygon().bounding_rect()?;
        Some((rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Strict point containment test against the canonical geometry.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        self.to_multi_polygon().contains(&Point::new(lon, lat))
    }

    /// Geodesic area in square meters on the WGS84 ellipsoid.
    pub fn area_m2(&self) -> f64 {
        self.to_multi_polygon().geodesic_area_unsigned()
    }
}

fn ring_positions(ring: &geo::LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn positions_ring(positions: &[[f64; 2]]) -> geo::LineString<f64> {
    geo::LineString::from(
        positions
            .iter()
            .map(|&[x, y]| geo::Coord { x, y })
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square(x0: f64, y0: f64, size: f64) -> BoundaryGeometry {
        let ring = vec![
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
            [x0, y0],
        ];
        BoundaryGeometry::from_rings(vec![vec![ring]])
    }

    #[test]
    fn test_roundtrip_through_geo() {
        let g = unit_square(-89.5, 43.0, 0.5);
        let mp = g.to_multi_polygon();
        let back = BoundaryGeometry::from_multi_polygon(&mp);
        assert_eq!(g, back);
    }

    #[test]
    fn test_contains_point() {
        let g = unit_square(-89.5, 43.0, 0.5);
        assert!(g.contains_point(-89.25, 43.25));
        assert!(!g.contains_point(-88.0, 43.25));
    }

    #[test]
    fn test_bbox() {
        let g = unit_square(-89.5, 43.0, 0.5);
        let (min_lon, min_lat, max_lon, max_lat) = g.bbox().unwrap();
        assert_eq!(min_lon, -89.5);
        assert_eq!(min_lat, 43.0);
        assert_eq!(max_lon, -89.0);
        assert_eq!(max_lat, 43.5);
    }

    #[test]
    fn test_validate_out_of_bounds() {
        let g = unit_square(179.8, 43.0, 0.5);
        assert!(matches!(
            g.validate(),
            Err(GeometryError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_validate_degenerate_ring() {
        let g = BoundaryGeometry::from_rings(vec![vec![vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 0.0],
        ]]]);
        assert!(matches!(
            g.validate(),
            Err(GeometryError::DegenerateRing(3))
        ));
    }

    #[test]
    fn test_area_positive() {
        let g = unit_square(-89.5, 43.0, 0.5);
        // Half-degree square near 43°N is on the order of 2e9 m².
        let area = g.area_m2();
        assert!(area > 1.0e9 && area < 4.0e9, "area = {area}");
    }
}
