//! Deterministic leaf encoding.
//!
//! A leaf is the SHA-256 digest of one boundary's canonical serialization:
//! id, name, level, geometry with coordinates quantized to the fixed
//! precision, and the provenance block. Quantization makes the encoding a
//! total, order-preserving function of the canonical record: builds that
//! disagree only below the seventh decimal place commit to the same leaf.

use serde::Serialize;

use crate::canonical::{quantize_coord, sha256_digest, to_canonical_bytes};
use crate::types::CanonicalBoundary;

/// The serialized shape that gets digested into a leaf.
#[derive(Serialize)]
struct LeafRecord<'a> {
    id: &'a str,
    name: &'a str,
    level: &'a crate::types::BoundaryLevel,
    /// Quantized coordinates: `polygons[p][r]` is ring `r` of polygon `p`,
    /// each vertex an integer (lon, lat) pair in 10^-7 degree units.
    geometry: Vec<Vec<Vec<(i64, i64)>>>,
    provenance: LeafProvenance<'a>,
}

/// Provenance fields that participate in the commitment.
///
/// `retrieved_at` is deliberately excluded: two byte-identical builds run
/// at different times must produce identical roots.
#[derive(Serialize)]
struct LeafProvenance<'a> {
    provider: &'a str,
    url: &'a str,
    vintage: u16,
    license: &'a str,
    content_sha256: &'a str,
    authority_level: &'a crate::types::AuthorityLevel,
    legal_status: &'a crate::types::LegalStatus,
    coordinate_system: &'a str,
}

/// Canonical byte serialization of one boundary, pre-digest.
pub fn leaf_bytes(boundary: &CanonicalBoundary) -> Vec<u8> {
    let geometry: Vec<Vec<Vec<(i64, i64)>>> = boundary
        .geometry
        .rings_by_polygon()
        .map(|rings| {
            rings
                .iter()
                .map(|ring| {
                    ring.iter()
                        .map(|&[lon, lat]| (quantize_coord(lon), quantize_coord(lat)))
                        .collect()
                })
                .collect()
        })
        .collect();

    let record = LeafRecord {
        id: &boundary.id,
        name: &boundary.name,
        level: &boundary.level,
        geometry,
        provenance: LeafProvenance {
            provider: &boundary.provenance.provider,
            url: &boundary.provenance.url,
            vintage: boundary.provenance.vintage,
            license: &boundary.provenance.license,
            content_sha256: &boundary.provenance.content_sha256,
            authority_level: &boundary.provenance.authority_level,
            legal_status: &boundary.provenance.legal_status,
            coordinate_system: &boundary.provenance.coordinate_system,
        },
    };
    to_canonical_bytes(&record)
}

/// Encode one boundary into its 32-byte leaf.
pub fn encode_leaf(boundary: &CanonicalBoundary) -> [u8; 32] {
    sha256_digest(&leaf_bytes(boundary))
}
