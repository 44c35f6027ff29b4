//! Atlas snapshot records.
//!
//! A snapshot is the immutable identity of one committed atlas build.
//! Created atomically at the end of a successful build; never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of cross-validation for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossValidationStatus {
    /// Every configured check ran and passed.
    Completed,
    /// Some checks ran; others were skipped for missing registry data.
    Partial,
    /// Cross-validation was not attempted.
    Skipped,
    /// A check failed but graceful fallback allowed the build to finish.
    FailedGraceful,
    /// Cross-validation is disabled by configuration.
    Disabled,
}

impl fmt::Display for CrossValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Skipped => write!(f, "skipped"),
            Self::FailedGraceful => write!(f, "failed_graceful"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Immutable record of one committed atlas build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasSnapshot {
    /// Unique snapshot identifier (hash of the record's identity fields).
    pub snapshot_id: String,
    /// Merkle root, 64-char lowercase hex.
    pub merkle_root: String,
    /// Depth of the Merkle tree (leaf level = 0 tree has depth 0).
    pub tree_depth: u32,
    /// Commitment scheme identifier.
    pub tree_type: String,
    /// Number of leaves committed.
    pub leaf_count: u64,
    /// Boundary counts per layer count-key.
    pub layer_counts: BTreeMap<String, u64>,
    /// TIGER vintage year of the inputs.
    pub tiger_vintage: u16,
    /// State FIPS codes included, sorted.
    pub states_included: Vec<String>,
    /// Layer wire codes included, sorted.
    pub layers_included: Vec<String>,
    /// Wall-clock build duration.
    pub build_duration_ms: u64,
    /// When the snapshot was committed.
    pub built_at: DateTime<Utc>,
    /// Cross-validation outcome.
    pub cross_validation_status: CrossValidationStatus,
}

impl AtlasSnapshot {
    /// Total boundaries across all layers.
    pub fn total_boundaries(&self) -> u64 {
        self.layer_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_boundaries() {
        let mut layer_counts = BTreeMap::new();
        layer_counts.insert("congressional_district".to_string(), 8u64);
        layer_counts.insert("county".to_string(), 72u64);
        let snap = AtlasSnapshot {
            snapshot_id: "s".into(),
            merkle_root: "0".repeat(64),
            tree_depth: 7,
            tree_type: crate::TREE_TYPE.to_string(),
            leaf_count: 80,
            layer_counts,
            tiger_vintage: 2024,
            states_included: vec!["55".into()],
            layers_included: vec!["cd".into(), "county".into()],
            build_duration_ms: 1200,
            built_at: Utc::now(),
            cross_validation_status: CrossValidationStatus::Completed,
        };
        assert_eq!(snap.total_boundaries(), 80);
    }

    #[test]
    fn test_status_serialization() {
        let s = serde_json::to_string(&CrossValidationStatus::FailedGraceful).unwrap();
        assert_eq!(s, "\"failed_graceful\"");
    }
}
