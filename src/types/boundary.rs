//! Canonical boundary records.
//!
//! A `CanonicalBoundary` is the invariant unit of the atlas: a stable
//! GEOID-keyed record with normalized EPSG:4326 geometry and a full
//! provenance block. The commitment engine exclusively owns these during a
//! build; once committed they are read-only inputs to the lookup service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::{BoundaryGeometry, GeometryError};
use super::layer::{AuthorityLevel, BoundaryLevel, LegalStatus};

/// Provenance block attached to every canonical boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Publishing organization (e.g. "US Census Bureau").
    pub provider: String,
    /// Canonical download URL the bytes came from.
    pub url: String,
    /// Vintage year of the source.
    pub vintage: u16,
    /// License of the upstream data.
    pub license: String,
    /// When the source bytes were retrieved.
    pub retrieved_at: DateTime<Utc>,
    /// SHA-256 of the raw source file, lowercase hex.
    pub content_sha256: String,
    /// Rank of the publishing authority.
    pub authority_level: AuthorityLevel,
    /// Legal standing of the boundary at retrieval time.
    pub legal_status: LegalStatus,
    /// Coordinate system of the canonical geometry (always EPSG:4326).
    pub coordinate_system: String,
}

impl Provenance {
    /// Whether the block carries the minimum required fields.
    pub fn is_complete(&self) -> bool {
        !self.provider.is_empty() && !self.url.is_empty() && !self.content_sha256.is_empty()
    }
}

/// Violation of a canonical-record invariant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BoundaryInvariantError {
    /// The id is empty.
    #[error("empty boundary id")]
    EmptyId,
    /// The name is empty.
    #[error("boundary {0}: empty name")]
    EmptyName(String),
    /// The provenance block is missing required fields.
    #[error("boundary {id}: incomplete provenance")]
    IncompleteProvenance {
        /// Id of the offending boundary.
        id: String,
    },
    /// The geometry violates WGS84 invariants.
    #[error("boundary {id}: {source}")]
    Geometry {
        /// Id of the offending boundary.
        id: String,
        /// The underlying geometry failure.
        source: GeometryError,
    },
}

/// The invariant boundary record committed into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBoundary {
    /// GEOID-formatted identifier, unique within a snapshot.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Boundary level.
    pub level: BoundaryLevel,
    /// Normalized geometry in EPSG:4326.
    pub geometry: BoundaryGeometry,
    /// Provenance block.
    pub provenance: Provenance,
}

impl CanonicalBoundary {
    /// State FIPS prefix of the id (first two characters).
    pub fn state_fips(&self) -> &str {
        &self.id[..self.id.len().min(2)]
    }

    /// Check the record-level invariants: non-empty id and name, complete
    /// provenance, valid geometry.
    ///
    /// The commitment engine runs this over every record before encoding
    /// leaves; a violation aborts the build.
    pub fn check_invariants(&self) -> Result<(), BoundaryInvariantError> {
        if self.id.is_empty() {
            return Err(BoundaryInvariantError::EmptyId);
        }
        if self.name.is_empty() {
            return Err(BoundaryInvariantError::EmptyName(self.id.clone()));
        }
        if !self.provenance.is_complete() {
            return Err(BoundaryInvariantError::IncompleteProvenance {
                id: self.id.clone(),
            });
        }
        self.geometry
            .validate()
            .map_err(|source| BoundaryInvariantError::Geometry {
                id: self.id.clone(),
                source,
            })
    }
}

// Ordered by id for deterministic leaf ordering.
impl Eq for CanonicalBoundary {}

impl PartialOrd for CanonicalBoundary {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalBoundary {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
