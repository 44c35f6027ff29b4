//! Normalization of validated features into canonical boundary records.
//!
//! The normalizer accepts EPSG:4326 GeoJSON features and produces
//! [`CanonicalBoundary`] records: rings closed, duplicate consecutive
//! vertices dropped, exterior rings oriented counter-clockwise and
//! interiors clockwise, provenance attached. Foreign-CRS input is rejected
//! at the parse seam — reprojection happens upstream of the kernel.

use chrono::{DateTime, Utc};
use geo::orient::{Direction, Orient};
use geojson::{Feature, Value};
use tracing::debug;

use crate::error::AtlasError;
use crate::types::{BoundaryGeometry, BoundarySource, CanonicalBoundary, Provenance};
use crate::types::LegalStatus;

/// Property keys probed, in order, for the record id.
const ID_KEYS: [&str; 4] = ["GEOID", "GEOID20", "GEOIDFQ", "DISTRICT_ID"];
/// Property keys probed, in order, for the record name.
const NAME_KEYS: [&str; 4] = ["NAMELSAD", "NAME", "NAMELSAD20", "DISTRICT_NAME"];

/// Feature → canonical boundary normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    provider: String,
    license: String,
}

impl Normalizer {
    /// Normalizer stamping the given provider and license into provenance.
    pub fn new(provider: impl Into<String>, license: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            license: license.into(),
        }
    }

    /// Census defaults.
    pub fn census() -> Self {
        Self::new("US Census Bureau", "public-domain")
    }

    /// Normalize one feature into a canonical boundary.
    pub fn normalize(
        &self,
        feature: &Feature,
        source: &BoundarySource,
        content_sha256: &str,
        retrieved_at: DateTime<Utc>,
    ) -> Result<CanonicalBoundary, AtlasError> {
        let id = property_string(feature, &ID_KEYS)
            .ok_or_else(|| AtlasError::Parse("feature has no GEOID property".to_string()))?;
        let name = property_string(feature, &NAME_KEYS).unwrap_or_else(|| id.clone());

        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| AtlasError::Parse(format!("feature {id} has no geometry")))?;
        let raw_polygons: Vec<Vec<Vec<Vec<f64>>>> = match &geometry.value {
            Value::Polygon(rings) => vec![rings.clone()],
            Value::MultiPolygon(polys) => polys.clone(),
            other => {
                return Err(AtlasError::Parse(format!(
                    "feature {id}: unsupported geometry type {}",
                    other.type_name()
                )));
            }
        };

        let mut polygons: Vec<Vec<Vec<[f64; 2]>>> = Vec::with_capacity(raw_polygons.len());
        for rings in &raw_polygons {
            let mut cleaned: Vec<Vec<[f64; 2]>> = Vec::with_capacity(rings.len());
            for ring in rings {
                let ring = clean_ring(ring);
                if ring.len() >= 4 {
                    cleaned.push(ring);
                } else {
                    debug!(id = %id, "dropping degenerate ring during normalization");
                }
            }
            if !cleaned.is_empty() {
                polygons.push(cleaned);
            }
        }
        if polygons.is_empty() {
            return Err(AtlasError::Parse(format!(
                "feature {id}: no usable rings after normalization"
            )));
        }

        // Orientation normalization: exteriors CCW, interiors CW.
        let oriented = BoundaryGeometry::from_rings(polygons)
            .to_multi_polygon()
            .orient(Direction::Default);
        let geometry = BoundaryGeometry::from_multi_polygon(&oriented);
        geometry
            .validate()
            .map_err(|e| AtlasError::Parse(format!("feature {id}: {e}")))?;

        Ok(CanonicalBoundary {
            id,
            name,
            level: source.layer.level(),
            geometry,
            provenance: Provenance {
                provider: self.provider.clone(),
                url: source.url.clone(),
                vintage: source.vintage,
                license: self.license.clone(),
                retrieved_at,
                content_sha256: content_sha256.to_string(),
                authority_level: source.authority,
                legal_status: LegalStatus::Enacted,
                coordinate_system: "EPSG:4326".to_string(),
            },
        })
    }

    /// Normalize a whole collection, returning records sorted by id.
    pub fn normalize_collection(
        &self,
        features: &[Feature],
        source: &BoundarySource,
        content_sha256: &str,
        retrieved_at: DateTime<Utc>,
    ) -> Result<Vec<CanonicalBoundary>, AtlasError> {
        let mut boundaries = Vec::with_capacity(features.len());
        for feature in features {
            boundaries.push(self.normalize(feature, source, content_sha256, retrieved_at)?);
        }
        boundaries.sort();
        Ok(boundaries)
    }
}

/// Close the ring and drop duplicate consecutive vertices.
fn clean_ring(ring: &[Vec<f64>]) -> Vec<[f64; 2]> {
    let mut cleaned: Vec<[f64; 2]> = Vec::with_capacity(ring.len() + 1);
    for position in ring {
        if position.len() < 2 {
            continue;
        }
        let vertex = [position[0], position[1]];
        if cleaned.last() != Some(&vertex) {
            cleaned.push(vertex);
        }
    }
    if cleaned.len() >= 3 && cleaned.first() != cleaned.last() {
        let first = cleaned[0];
        cleaned.push(first);
    }
    cleaned
}

fn property_string(feature: &Feature, keys: &[&str]) -> Option<String> {
    let props = feature.properties.as_ref()?;
    for key in keys {
        if let Some(value) = props.get(*key) {
            if let Some(s) = value.as_str() {
                return Some(s.to_string());
            }
            if value.is_number() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceRegistry;
    use crate::types::Layer;
    use serde_json::json;

    fn source() -> BoundarySource {
        SourceRegistry::new()
            .source(Layer::CongressionalDistrict, "55", 2024)
            .unwrap()
    }

    fn feature(raw: serde_json::Value) -> Feature {
        Feature::try_from(raw.to_string().parse::<geojson::GeoJson>().unwrap()).unwrap()
    }

    fn sha() -> String {
        "ab".repeat(32)
    }

    #[test]
    fn test_normalizes_clean_polygon() {
        let f = feature(json!({
            "type": "Feature",
            "properties": { "GEOID": "5501", "NAMELSAD": "Congressional District 1" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-89.5, 43.0], [-89.0, 43.0], [-89.0, 43.5], [-89.5, 43.5], [-89.5, 43.0]
                ]]
            }
        }));
        let boundary = Normalizer::census()
            .normalize(&f, &source(), &sha(), Utc::now())
            .unwrap();
        assert_eq!(boundary.id, "5501");
        assert_eq!(boundary.name, "Congressional District 1");
        assert_eq!(boundary.provenance.coordinate_system, "EPSG:4326");
        assert!(boundary.geometry.validate().is_ok());
    }

    #[test]
    fn test_closes_open_ring() {
        let f = feature(json!({
            "type": "Feature",
            "properties": { "GEOID": "5501" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-89.5, 43.0], [-89.0, 43.0], [-89.0, 43.5], [-89.5, 43.5]
                ]]
            }
        }));
        let boundary = Normalizer::census()
            .normalize(&f, &source(), &sha(), Utc::now())
            .unwrap();
        let ring = boundary.geometry.rings().next().unwrap();
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn test_drops_duplicate_consecutive_vertices() {
        let f = feature(json!({
            "type": "Feature",
            "properties": { "GEOID": "5501" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-89.5, 43.0], [-89.5, 43.0], [-89.0, 43.0], [-89.0, 43.5],
                    [-89.5, 43.5], [-89.5, 43.0]
                ]]
            }
        }));
        let boundary = Normalizer::census()
            .normalize(&f, &source(), &sha(), Utc::now())
            .unwrap();
        assert_eq!(boundary.geometry.vertex_count(), 5);
    }

    #[test]
    fn test_orientation_normalized() {
        // Clockwise exterior ring on input.
        let f = feature(json!({
            "type": "Feature",
            "properties": { "GEOID": "5501" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-89.5, 43.0], [-89.5, 43.5], [-89.0, 43.5], [-89.0, 43.0], [-89.5, 43.0]
                ]]
            }
        }));
        let boundary = Normalizer::census()
            .normalize(&f, &source(), &sha(), Utc::now())
            .unwrap();
        // Signed geodesic area is positive for CCW exteriors.
        use geo::GeodesicArea;
        let signed = boundary.geometry.to_multi_polygon().geodesic_area_signed();
        assert!(signed > 0.0, "exterior not CCW: signed area {signed}");
    }

    #[test]
    fn test_missing_geoid_is_parse_error() {
        let f = feature(json!({
            "type": "Feature",
            "properties": { "NAME": "nameless" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-89.5, 43.0], [-89.0, 43.0], [-89.0, 43.5], [-89.5, 43.5], [-89.5, 43.0]
                ]]
            }
        }));
        let err = Normalizer::census()
            .normalize(&f, &source(), &sha(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AtlasError::Parse(_)));
    }

    #[test]
    fn test_point_geometry_is_parse_error() {
        let f = feature(json!({
            "type": "Feature",
            "properties": { "GEOID": "5501" },
            "geometry": { "type": "Point", "coordinates": [-89.4, 43.1] }
        }));
        let err = Normalizer::census()
            .normalize(&f, &source(), &sha(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AtlasError::Parse(_)));
    }

    #[test]
    fn test_collection_sorted_by_id() {
        let make = |id: &str, x0: f64| {
            feature(json!({
                "type": "Feature",
                "properties": { "GEOID": id },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [x0, 43.0], [x0 + 0.4, 43.0], [x0 + 0.4, 43.4], [x0, 43.4], [x0, 43.0]
                    ]]
                }
            }))
        };
        let features = vec![make("5503", -88.0), make("5501", -90.0), make("5502", -89.0)];
        let boundaries = Normalizer::census()
            .normalize_collection(&features, &source(), &sha(), Utc::now())
            .unwrap();
        let ids: Vec<_> = boundaries.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["5501", "5502", "5503"]);
    }
}
