//! Acquisition subsystem: change detection, download, dead-letter queue,
//! checkpointing, and batch orchestration.
//!
//! This subsystem exclusively owns the checksum cache, the DLQ, and the
//! checkpoint store. All three are JSON documents written atomically
//! (write-to-temp-then-rename) under a single-writer discipline.

pub mod checksum_cache;
pub mod change;
pub mod download;
pub mod dlq;
pub mod checkpoint;
pub mod orchestrator;

pub use checksum_cache::ChecksumCache;
pub use change::ChangeDetector;
pub use download::{Downloader, ChecksumManifest, ManifestPolicy, RateGate};
pub use dlq::DeadLetterQueue;
pub use checkpoint::CheckpointStore;
pub use orchestrator::{IngestOrchestrator, BatchOutcome, CancelFlag, StateProcessor};

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::config::AtlasConfig;
use crate::error::AtlasError;

/// Checksum cache document name under the persistence directory.
const CHECKSUM_CACHE_FILE: &str = "checksums.json";
/// Dead-letter queue document name under the persistence directory.
const DLQ_FILE: &str = "dlq.json";
/// Cross-run attempt budget for dead-letter rows.
const DLQ_MAX_ATTEMPTS: u32 = 5;
/// Backoff multiplier for dead-letter retry scheduling.
const DLQ_BACKOFF_MULTIPLIER: f64 = 2.0;

/// The acquisition-owned persisted stores, opened from configuration.
///
/// Both documents live under `persistence.database_path`. With
/// `persistence.auto_migrate` set, a missing directory is created on open;
/// without it, a missing directory is a configuration error.
#[derive(Debug)]
pub struct AcquisitionStores {
    /// Validator cache for change detection.
    pub checksum_cache: Arc<ChecksumCache>,
    /// Terminal-failure download rows.
    pub dlq: Arc<DeadLetterQueue>,
}

impl AcquisitionStores {
    /// Open (or create) the stores under the configured directory.
    pub fn open(config: &AtlasConfig) -> Result<Self, AtlasError> {
        let dir = &config.persistence.database_path;
        if !dir.exists() {
            if !config.persistence.auto_migrate {
                return Err(AtlasError::Configuration(format!(
                    "persistence directory {} does not exist and auto_migrate is disabled",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)?;
        }
        let checksum_cache = Arc::new(ChecksumCache::open(dir.join(CHECKSUM_CACHE_FILE))?);
        let dlq = Arc::new(DeadLetterQueue::open(
            dir.join(DLQ_FILE),
            DLQ_MAX_ATTEMPTS,
            config.extraction.retry_delay_ms,
            DLQ_BACKOFF_MULTIPLIER,
        )?);
        Ok(Self {
            checksum_cache,
            dlq,
        })
    }
}

/// Write `bytes` to `path` atomically: write a sibling temp file, flush,
/// then rename over the destination.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceRegistry;
    use crate::types::Layer;

    #[test]
    fn test_stores_open_creates_directory_when_migrating() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AtlasConfig::default();
        config.persistence.database_path = dir.path().join("state");
        config.persistence.auto_migrate = true;

        let stores = AcquisitionStores::open(&config).unwrap();
        assert!(config.persistence.database_path.exists());

        // Rows written through the stores land in the configured documents.
        let source = SourceRegistry::new()
            .source(Layer::CongressionalDistrict, "56", 2024)
            .unwrap();
        stores.dlq.record_failure(&source, "job", "HTTP 404").unwrap();
        drop(stores);

        let reopened = AcquisitionStores::open(&config).unwrap();
        assert_eq!(reopened.dlq.len(), 1);
    }

    #[test]
    fn test_stores_open_refuses_missing_directory_without_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AtlasConfig::default();
        config.persistence.database_path = dir.path().join("absent");
        config.persistence.auto_migrate = false;

        let err = AcquisitionStores::open(&config).unwrap_err();
        assert!(matches!(err, AtlasError::Configuration(_)));
        assert!(!config.persistence.database_path.exists());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        atomic_write(&path, b"{\"v\":1}").unwrap();
        atomic_write(&path, b"{\"v\":2}").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"v\":2}");
        // No temp file left behind.
        assert!(!path.with_extension("tmp").exists());
    }
}
