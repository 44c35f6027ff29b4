//! Boundary fetching seam.
//!
//! [`BoundaryFetcher`] is the trait the builder and orchestrator consume:
//! given a registered source, produce its parsed FeatureCollection plus the
//! content digest of the raw bytes. Backends:
//!
//! - [`InMemoryFetcher`] — deterministic fixture store for tests
//! - [`HttpFetcher`] — download layer + GeoJSON parse (shapefile-to-GeoJSON
//!   conversion happens upstream of the kernel)

pub mod memory;
pub mod http;

pub use memory::InMemoryFetcher;
pub use http::HttpFetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geojson::FeatureCollection;

use crate::acquisition::CancelFlag;
use crate::error::AtlasError;
use crate::types::BoundarySource;

/// One fetched layer: parsed features plus raw-byte provenance.
#[derive(Debug, Clone)]
pub struct FetchedLayer {
    /// The source that was fetched.
    pub source: BoundarySource,
    /// Parsed FeatureCollection.
    pub features: FeatureCollection,
    /// SHA-256 of the raw bytes, lowercase hex.
    pub content_sha256: String,
    /// When the bytes were retrieved.
    pub retrieved_at: DateTime<Utc>,
}

/// Seam for acquiring one source's features.
#[async_trait]
pub trait BoundaryFetcher: Send + Sync {
    /// Fetch and parse one source.
    async fn fetch(
        &self,
        source: &BoundarySource,
        cancel: &CancelFlag,
    ) -> Result<FetchedLayer, AtlasError>;
}

/// Parse raw GeoJSON text into a FeatureCollection.
///
/// GeoJSON is WGS84 by definition; a legacy `crs` member naming anything
/// other than CRS84/EPSG:4326 is rejected rather than silently misread.
pub(crate) fn parse_feature_collection(raw: &str) -> Result<FeatureCollection, AtlasError> {
    let fc = match raw.parse::<geojson::GeoJson>() {
        Ok(geojson::GeoJson::FeatureCollection(fc)) => fc,
        Ok(_) => {
            return Err(AtlasError::Parse(
                "root object is not a FeatureCollection".to_string(),
            ))
        }
        Err(e) => return Err(AtlasError::Parse(format!("GeoJSON parse failure: {e}"))),
    };

    if let Some(members) = &fc.foreign_members {
        if let Some(crs) = members.get("crs") {
            let name = crs
                .pointer("/properties/name")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if !name.is_empty() && !name.contains("CRS84") && !name.contains("4326") {
                return Err(AtlasError::Parse(format!(
                    "unsupported CRS {name}; reproject to EPSG:4326 upstream"
                )));
            }
        }
    }
    Ok(fc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_crs_rejected() {
        let raw = r#"{"type":"FeatureCollection","crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::3857"}},"features":[]}"#;
        assert!(matches!(
            parse_feature_collection(raw),
            Err(AtlasError::Parse(_))
        ));
    }

    #[test]
    fn test_crs84_accepted() {
        let raw = r#"{"type":"FeatureCollection","crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:OGC:1.3:CRS84"}},"features":[]}"#;
        assert!(parse_feature_collection(raw).is_ok());
    }

    #[test]
    fn test_no_crs_member_accepted() {
        let raw = r#"{"type":"FeatureCollection","features":[]}"#;
        assert!(parse_feature_collection(raw).is_ok());
    }
}
