//! Source descriptors.
//!
//! A source is the triple (layer, region, vintage) plus everything the
//! acquisition pipeline needs to fetch and cross-check it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::layer::{AuthorityLevel, Layer, UpdateTrigger};

/// Stable identifier for a source: `"<layer>:<state_fips>:<year>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Build the id from its components.
    pub fn new(layer: Layer, state_fips: &str, year: u16) -> Self {
        Self(format!("{}:{}:{}", layer.code(), state_fips, year))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GEOID format descriptor for a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoidFormat {
    /// Regex the full GEOID must match (anchored).
    pub pattern: String,
    /// Expected total id width, when fixed; None for variable-width layers.
    pub width: Option<usize>,
    /// Whether the id must start with the source's state FIPS.
    pub state_prefixed: bool,
}

/// One registered upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySource {
    /// Boundary layer this source provides.
    pub layer: Layer,
    /// Two-digit state FIPS code ("56" = Wyoming, "72" = Puerto Rico).
    pub state_fips: String,
    /// Vintage year.
    pub vintage: u16,
    /// Canonical download URL.
    pub url: String,
    /// Authoritative expected record count, when known.
    pub expected_count: Option<u32>,
    /// GEOID format for records in this source.
    pub geoid_format: GeoidFormat,
    /// Rank of the publishing authority.
    pub authority: AuthorityLevel,
    /// When this source becomes due for a change check.
    pub trigger: UpdateTrigger,
}

impl BoundarySource {
    /// The source's stable identifier.
    pub fn id(&self) -> SourceId {
        SourceId::new(self.layer, &self.state_fips, self.vintage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_format() {
        let id = SourceId::new(Layer::CongressionalDistrict, "56", 2024);
        assert_eq!(id.as_str(), "cd:56:2024");
    }

    #[test]
    fn test_source_id_ordering_is_lexicographic() {
        let a = SourceId::new(Layer::CongressionalDistrict, "09", 2024);
        let b = SourceId::new(Layer::CongressionalDistrict, "55", 2024);
        assert!(a < b);
    }
}
