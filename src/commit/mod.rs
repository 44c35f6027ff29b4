//! Commitment engine.
//!
//! Sorts canonical boundaries by id, serializes each into a fixed leaf
//! encoding, builds a binary SHA-256 Merkle tree, and assembles the
//! immutable snapshot record. The archive submodule persists a committed
//! snapshot (record + boundary lines) atomically and loads it back for the
//! lookup service.

pub mod leaf;
pub mod merkle;
pub mod archive;

pub use leaf::{encode_leaf, leaf_bytes};
pub use merkle::{MerkleTree, MerkleProof};
pub use archive::SnapshotArchive;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::canonical::canonical_hash_hex;
use crate::error::AtlasError;
use crate::types::{AtlasSnapshot, CanonicalBoundary, CrossValidationStatus, Layer};

/// Commit a set of canonical boundaries into a snapshot record.
///
/// Boundaries are sorted by id; a duplicate id aborts with
/// [`AtlasError::DuplicateBoundaryId`], and any record violating the
/// canonical invariants (empty id or name, incomplete provenance, invalid
/// geometry) aborts before a single leaf is encoded. The caller supplies
/// scope metadata and the build timings.
#[allow(clippy::too_many_arguments)]
pub fn commit_snapshot(
    boundaries: &mut Vec<CanonicalBoundary>,
    layer_membership: &BTreeMap<String, Layer>,
    tiger_vintage: u16,
    states_included: Vec<String>,
    layers_included: Vec<String>,
    build_started_at: DateTime<Utc>,
    cross_validation_status: CrossValidationStatus,
) -> Result<(AtlasSnapshot, MerkleTree), AtlasError> {
    boundaries.sort();
    for pair in boundaries.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(AtlasError::DuplicateBoundaryId(pair[0].id.clone()));
        }
    }
    for boundary in boundaries.iter() {
        boundary
            .check_invariants()
            .map_err(|e| AtlasError::Parse(format!("invalid canonical record: {e}")))?;
    }

    let leaves: Vec<[u8; 32]> = boundaries.iter().map(encode_leaf).collect();
    let tree = MerkleTree::build(leaves);

    let mut layer_counts: BTreeMap<String, u64> = BTreeMap::new();
    for boundary in boundaries.iter() {
        let key = layer_membership
            .get(&boundary.id)
            .map(|l| l.count_key().to_string())
            .unwrap_or_else(|| boundary.level.to_string());
        *layer_counts.entry(key).or_default() += 1;
    }

    let built_at = Utc::now();
    let build_duration_ms = (built_at - build_started_at).num_milliseconds().max(0) as u64;

    let mut states_included = states_included;
    states_included.sort();
    states_included.dedup();
    let mut layers_included = layers_included;
    layers_included.sort();
    layers_included.dedup();

    let snapshot_id = canonical_hash_hex(&(
        tree.root_hex(),
        tree.leaf_count() as u64,
        tiger_vintage,
        &states_included,
        &layers_included,
    ));

    let snapshot = AtlasSnapshot {
        snapshot_id: format!("snap_{snapshot_id}"),
        merkle_root: tree.root_hex(),
        tree_depth: tree.depth(),
        tree_type: crate::TREE_TYPE.to_string(),
        leaf_count: tree.leaf_count() as u64,
        layer_counts,
        tiger_vintage,
        states_included,
        layers_included,
        build_duration_ms,
        built_at,
        cross_validation_status,
    };
    Ok((snapshot, tree))
}
