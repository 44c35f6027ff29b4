//! Configuration for the atlas kernel.
//!
//! Plain serde structs grouped by subsystem, passed programmatically.
//! Every field has a production-reasonable default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Download/extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Parallel downloads per batch.
    pub concurrency: usize,
    /// Retry attempts for transient failures.
    pub retry_attempts: u32,
    /// Base retry delay in milliseconds (doubles per attempt).
    pub retry_delay_ms: u64,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Minimum delay between requests to the same host, milliseconds.
    pub per_host_min_delay_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            timeout_ms: 120_000,
            per_host_min_delay_ms: 500,
        }
    }
}

/// Validation thresholds and halt gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum share of features that must pass post-download validation.
    pub min_pass_rate: f64,
    /// Abort the build on topology defects.
    pub halt_on_topology_error: bool,
    /// Abort the build on completeness defects.
    pub halt_on_completeness_error: bool,
    /// Abort the build on coordinate defects.
    pub halt_on_coordinate_error: bool,
    /// Abort the build on forbidden overlaps.
    pub halt_on_overlap: bool,
    /// Abort the build when state coverage falls below 0.95.
    pub halt_on_coverage: bool,
    /// Abort the build when the count diff exceeds 10%.
    pub halt_on_count_mismatch: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_pass_rate: 0.9,
            halt_on_topology_error: false,
            halt_on_completeness_error: false,
            halt_on_coordinate_error: true,
            halt_on_overlap: false,
            halt_on_coverage: false,
            halt_on_count_mismatch: true,
        }
    }
}

/// Batch ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchIngestionConfig {
    /// Whether batch ingestion is enabled.
    pub enabled: bool,
    /// Directory for checkpoint files.
    pub checkpoint_dir: PathBuf,
    /// Maximum in-flight state tasks.
    pub max_concurrent_states: usize,
    /// Consecutive failures before the circuit opens.
    pub circuit_breaker_threshold: u32,
    /// Resume the most recent open checkpoint at startup.
    pub resume_on_restart: bool,
}

impl Default for BatchIngestionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            checkpoint_dir: PathBuf::from("checkpoints"),
            max_concurrent_states: 4,
            circuit_breaker_threshold: 5,
            resume_on_restart: false,
        }
    }
}

/// Persistence settings for the acquisition-owned stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the checksum cache and dead-letter documents.
    pub database_path: PathBuf,
    /// Create missing store files on first write.
    pub auto_migrate: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("atlas-state"),
            auto_migrate: true,
        }
    }
}

/// Cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    /// Whether cross-validation runs at all.
    pub enabled: bool,
    /// Fail the build on a count mismatch instead of degrading the status.
    pub fail_on_mismatch: bool,
    /// Minimum acceptable per-layer quality score.
    pub min_quality_score: u8,
    /// Degrade to `failed_graceful` instead of aborting on check errors.
    pub graceful_fallback: bool,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_on_mismatch: false,
            min_quality_score: 70,
            graceful_fallback: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Download/extraction settings.
    pub extraction: ExtractionConfig,
    /// Validation thresholds and halt gates.
    pub validation: ValidationConfig,
    /// Batch ingestion settings.
    pub batch_ingestion: BatchIngestionConfig,
    /// Persistence settings.
    pub persistence: PersistenceConfig,
    /// Cross-validation settings.
    pub cross_validation: CrossValidationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = AtlasConfig::default();
        assert!(cfg.extraction.retry_attempts >= 1);
        assert!(cfg.validation.min_pass_rate > 0.0 && cfg.validation.min_pass_rate <= 1.0);
        assert!(cfg.batch_ingestion.circuit_breaker_threshold >= 1);
    }

    #[test]
    fn test_config_roundtrip() {
        let cfg = AtlasConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AtlasConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
