//! Snapshot archive: persisted form of a committed atlas.
//!
//! An archive directory holds three artifacts:
//!
//! - `snapshot.json` — the immutable snapshot record
//! - `boundaries.jsonl` — one canonical boundary per line, in id order
//! - `manifest.json` — content hash tying the boundary lines to the record
//!
//! Writes are atomic per artifact, and the manifest is written last, so a
//! torn write never yields a loadable-but-wrong archive.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::canonical::sha256_hex;
use crate::commit::{encode_leaf, MerkleTree};
use crate::error::AtlasError;
use crate::types::{AtlasSnapshot, CanonicalBoundary};

const SNAPSHOT_FILE: &str = "snapshot.json";
const BOUNDARIES_FILE: &str = "boundaries.jsonl";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArchiveManifest {
    snapshot_id: String,
    merkle_root: String,
    boundary_count: u64,
    boundaries_sha256: String,
}

/// A committed snapshot together with its boundary records.
#[derive(Debug, Clone)]
pub struct SnapshotArchive {
    /// The immutable snapshot record.
    pub snapshot: AtlasSnapshot,
    /// Canonical boundaries in id order.
    pub boundaries: Vec<CanonicalBoundary>,
}

impl SnapshotArchive {
    /// Assemble an archive (boundaries are sorted defensively).
    pub fn new(snapshot: AtlasSnapshot, mut boundaries: Vec<CanonicalBoundary>) -> Self {
        boundaries.sort();
        Self {
            snapshot,
            boundaries,
        }
    }

    /// Persist the archive into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<(), AtlasError> {
        std::fs::create_dir_all(dir)?;

        let snapshot_bytes = serde_json::to_vec_pretty(&self.snapshot)?;
        crate::acquisition::atomic_write(&dir.join(SNAPSHOT_FILE), &snapshot_bytes)?;

        let mut lines = String::new();
        for boundary in &self.boundaries {
            lines.push_str(&serde_json::to_string(boundary)?);
            lines.push('\n');
        }
        crate::acquisition::atomic_write(&dir.join(BOUNDARIES_FILE), lines.as_bytes())?;

        let manifest = ArchiveManifest {
            snapshot_id: self.snapshot.snapshot_id.clone(),
            merkle_root: self.snapshot.merkle_root.clone(),
            boundary_count: self.boundaries.len() as u64,
            boundaries_sha256: sha256_hex(lines.as_bytes()),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        crate::acquisition::atomic_write(&dir.join(MANIFEST_FILE), &manifest_bytes)?;

        info!(
            snapshot = %self.snapshot.snapshot_id,
            boundaries = self.boundaries.len(),
            dir = %dir.display(),
            "archive written"
        );
        Ok(())
    }

    /// Load and verify an archive from `dir`.
    ///
    /// Verification checks the manifest content hash and recomputes the
    /// Merkle root from the boundary lines; a mismatch is an
    /// [`AtlasError::IntegrityFailure`].
    pub fn load_from(dir: &Path) -> Result<Self, AtlasError> {
        let manifest: ArchiveManifest =
            serde_json::from_str(&std::fs::read_to_string(dir.join(MANIFEST_FILE))?)?;
        let snapshot: AtlasSnapshot =
            serde_json::from_str(&std::fs::read_to_string(dir.join(SNAPSHOT_FILE))?)?;
        let lines = std::fs::read_to_string(dir.join(BOUNDARIES_FILE))?;

        let actual_sha = sha256_hex(lines.as_bytes());
        if actual_sha != manifest.boundaries_sha256 {
            return Err(AtlasError::IntegrityFailure {
                url: dir.join(BOUNDARIES_FILE).display().to_string(),
                expected: manifest.boundaries_sha256,
                actual: actual_sha,
            });
        }

        let mut boundaries = Vec::with_capacity(manifest.boundary_count as usize);
        for line in lines.lines() {
            if line.trim().is_empty() {
                continue;
            }
            boundaries.push(serde_json::from_str::<CanonicalBoundary>(line)?);
        }

        let leaves: Vec<[u8; 32]> = boundaries.iter().map(encode_leaf).collect();
        let recomputed = MerkleTree::build(leaves).root_hex();
        if recomputed != snapshot.merkle_root {
            return Err(AtlasError::IntegrityFailure {
                url: dir.display().to_string(),
                expected: snapshot.merkle_root,
                actual: recomputed,
            });
        }

        Ok(Self {
            snapshot,
            boundaries,
        })
    }
}
