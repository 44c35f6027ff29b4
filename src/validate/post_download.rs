//! Post-download structural validation.
//!
//! Five checks run in order against a freshly parsed FeatureCollection; any
//! issue fails the result, warnings only lower confidence. The stages:
//!
//! 1. Type — the object is a FeatureCollection with a features array
//! 2. Cardinality — between 1 and 100 features (more reads as precinct data)
//! 3. Geometry mix — at least one polygonal geometry
//! 4. Property keys — no banned key substrings, district-like keys expected
//! 5. Per-feature geometry — closed rings, ≥ 4 vertices, WGS84 bounds,
//!    aggregate bounding-box sanity

use geojson::{FeatureCollection, GeoJson, Value};
use serde::{Deserialize, Serialize};

/// Feature count above which data is rejected as precinct-granularity.
const MAX_FEATURES: usize = 100;

/// Property-key substrings that reject the file outright.
const BANNED_KEY_SUBSTRINGS: [&str; 6] = [
    "PRECINCT", "POLLING", "VOTING", "PARCEL", "CANOPY", "ZONING",
];

/// Property-key substrings that mark district-like data.
const DISTRICT_KEY_SUBSTRINGS: [&str; 4] = ["DISTRICT", "WARD", "COUNCIL", "GEOID"];

/// Result of post-download validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDownloadResult {
    /// Whether the file is accepted.
    pub valid: bool,
    /// Confidence score in [0, 100].
    pub confidence: u8,
    /// Hard failures (any one rejects the file).
    pub issues: Vec<String>,
    /// Soft findings (lower confidence only).
    pub warnings: Vec<String>,
    /// Feature count and aggregate bounding box, when computable.
    pub metadata: PostDownloadMetadata,
}

/// Metadata captured during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostDownloadMetadata {
    /// Number of features in the collection.
    pub feature_count: usize,
    /// Number of polygonal features.
    pub polygon_count: usize,
    /// Aggregate bounding box (min_lon, min_lat, max_lon, max_lat).
    pub bbox: Option<(f64, f64, f64, f64)>,
}

/// Five-stage structural validator.
#[derive(Debug, Clone, Default)]
pub struct PostDownloadValidator;

impl PostDownloadValidator {
    /// Create a validator.
    pub fn new() -> Self {
        Self
    }

    /// Validate raw GeoJSON text.
    ///
    /// Parse failures are reported as stage-1 issues, not errors: a file
    /// that is not a FeatureCollection is a rejected file.
    pub fn validate_text(&self, raw: &str) -> PostDownloadResult {
        match raw.parse::<GeoJson>() {
            Ok(GeoJson::FeatureCollection(fc)) => self.validate(&fc),
            Ok(_) => reject_early("Root object is not a FeatureCollection"),
            Err(e) => reject_early(&format!("GeoJSON parse failure: {e}")),
        }
    }

    /// Validate a parsed FeatureCollection.
    pub fn validate(&self, fc: &FeatureCollection) -> PostDownloadResult {
        let mut issues: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut metadata = PostDownloadMetadata {
            feature_count: fc.features.len(),
            ..Default::default()
        };

        // Stage 2: cardinality.
        if fc.features.is_empty() {
            issues.push("FeatureCollection has no features".to_string());
        } else if fc.features.len() > MAX_FEATURES {
            issues.push(format!(
                "{} features exceeds {MAX_FEATURES}; reads as precinct-granularity data",
                fc.features.len()
            ));
        }

        // Stage 3: geometry mix.
        let mut polygon_count = 0usize;
        let mut non_polygon_count = 0usize;
        let mut null_count = 0usize;
        for feature in &fc.features {
            match feature.geometry.as_ref().map(|g| &g.value) {
                Some(Value::Polygon(_)) | Some(Value::MultiPolygon(_)) => polygon_count += 1,
                Some(_) => non_polygon_count += 1,
                None => null_count += 1,
            }
        }
        metadata.polygon_count = polygon_count;
        if !fc.features.is_empty() && polygon_count == 0 {
            issues.push("No Polygon or MultiPolygon geometries".to_string());
        } else if non_polygon_count > 0 || null_count > 0 {
            warnings.push(format!(
                "Mixed geometry: {polygon_count} polygonal, {non_polygon_count} other, {null_count} null"
            ));
        }

        // Stage 4: property keys.
        let mut district_like = false;
        'features: for feature in &fc.features {
            if let Some(props) = &feature.properties {
                for key in props.keys() {
                    let upper = key.to_uppercase();
                    for banned in BANNED_KEY_SUBSTRINGS {
                        if upper.contains(banned) {
                            issues.push(format!("Banned property key '{key}' (contains {banned})"));
                            break 'features;
                        }
                    }
                    if DISTRICT_KEY_SUBSTRINGS.iter().any(|d| upper.contains(d)) {
                        district_like = true;
                    }
                }
            }
        }
        if !district_like && !fc.features.is_empty() {
            warnings.push("No district-like property keys (DISTRICT/WARD/COUNCIL/GEOID)".to_string());
        }

        // Stage 5: per-feature geometry.
        let mut bbox: Option<(f64, f64, f64, f64)> = None;
        for (index, feature) in fc.features.iter().enumerate() {
            let Some(geometry) = &feature.geometry else { continue };
            let rings: Vec<&Vec<Vec<f64>>> = match &geometry.value {
                Value::Polygon(rings) => rings.iter().collect(),
                Value::MultiPolygon(polys) => polys.iter().flatten().collect(),
                _ => continue,
            };
            for ring in rings {
                if ring.len() < 4 {
                    issues.push(format!(
                        "Feature {index}: ring with {} vertices (minimum 4)",
                        ring.len()
                    ));
                    continue;
                }
                if ring.first() != ring.last() {
                    issues.push(format!("Feature {index}: ring not closed"));
                }
                for position in ring {
                    let (lon, lat) = (position[0], position[1]);
                    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                        issues.push(format!(
                            "Feature {index}: coordinate out of range ({lon}, {lat})"
                        ));
                        break;
                    }
                    bbox = Some(match bbox {
                        None => (lon, lat, lon, lat),
                        Some((min_lon, min_lat, max_lon, max_lat)) => (
                            min_lon.min(lon),
                            min_lat.min(lat),
                            max_lon.max(lon),
                            max_lat.max(lat),
                        ),
                    });
                }
            }
        }
        metadata.bbox = bbox;
        if let Some((min_lon, min_lat, max_lon, max_lat)) = bbox {
            let span = (max_lon - min_lon).max(max_lat - min_lat);
            if span > 10.0 {
                warnings.push(format!("Bounding box spans {span:.2}°; larger than one state"));
            } else if span < 0.001 {
                warnings.push(format!("Bounding box spans {span:.6}°; implausibly small"));
            }
        }

        let confidence = confidence_score(&issues, &warnings, district_like, &metadata);
        PostDownloadResult {
            valid: issues.is_empty(),
            confidence,
            issues,
            warnings,
            metadata,
        }
    }
}

/// Score: start at 100; -20 per issue, -5 per warning; +10 for district-like
/// keys, +10 when all geometries are polygonal, +10 for 3..=50 features;
/// clamp to [0, 100].
fn confidence_score(
    issues: &[String],
    warnings: &[String],
    district_like: bool,
    metadata: &PostDownloadMetadata,
) -> u8 {
    let mut score: i32 = 100;
    score -= 20 * issues.len() as i32;
    score -= 5 * warnings.len() as i32;
    if district_like {
        score += 10;
    }
    if metadata.feature_count > 0 && metadata.polygon_count == metadata.feature_count {
        score += 10;
    }
    if (3..=50).contains(&metadata.feature_count) {
        score += 10;
    }
    score.clamp(0, 100) as u8
}

fn reject_early(issue: &str) -> PostDownloadResult {
    PostDownloadResult {
        valid: false,
        confidence: 0,
        issues: vec![issue.to_string()],
        warnings: Vec::new(),
        metadata: PostDownloadMetadata::default(),
    }
}
