//! # civic-atlas-kernel
//!
//! Verifiable, content-addressed atlas of US civic boundary geometries.
//!
//! The kernel answers two questions:
//!
//! > Given a heterogeneous stream of upstream boundary files, what is the
//! > single deterministic Merkle commitment over every boundary record?
//!
//! > Given a committed snapshot and a point (lat, lon), which district
//! > contains it?
//!
//! ## Core Contract
//!
//! 1. Acquire upstream sources with change detection, integrity checks,
//!    retry control, and resumable batch orchestration
//! 2. Validate every layer (format, counts, topology, coverage) with
//!    configurable halt gates
//! 3. Normalize validated features into canonical boundary records and
//!    commit them to a binary Merkle tree whose root is the snapshot identity
//! 4. Serve point-in-polygon lookups against a committed snapshot through a
//!    bounding-box index and a TTL'd LRU cache
//!
//! ## Architecture
//!
//! Change detection and atlas building are sibling entry points over the
//! same registry: `checkForChange`/`checkScheduledSources` report what moved
//! upstream, while a build is always a full rebuild of its scope and never
//! consults the change detector.
//!
//! ```text
//!                 ┌─→ ChangeDetector ─→ ChangeReports
//! SourceRegistry ─┤
//!                 └─→ Downloader → Orchestrator
//!                                       ↓
//!                   PostDownloadValidator → LayerValidators
//!                                       ↓
//!                      Normalizer → CommitmentEngine → AtlasSnapshot
//!                                                           ↓
//!                                                     LookupService
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same input byte streams + same configuration → identical Merkle root
//! - Leaves are ordered by boundary id (lexicographic); duplicates abort
//! - Hashed structures use BTreeMap/sorted Vec only — never HashMap

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod config;
pub mod canonical;
pub mod registry;
pub mod progress;
pub mod acquisition;
pub mod validate;
pub mod normalize;
pub mod commit;
pub mod fetch;
pub mod builder;
pub mod lookup;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Layer, BoundaryLevel, AuthorityLevel, LegalStatus, UpdateTrigger,
    SourceId, BoundarySource, GeoidFormat,
    BoundaryGeometry, BoundaryInvariantError, CanonicalBoundary, Provenance,
    ChangeKind, ChangeReport, ChecksumEntry,
    FailedDownload, DownloadStatus,
    BatchCheckpoint, BatchOptions,
    AtlasSnapshot, CrossValidationStatus,
    ValidationReport, CountCheck, TopologyCheck, CoordinateCheck,
};
pub use error::{AtlasError, ErrorKind, classify};
pub use config::{
    AtlasConfig, ExtractionConfig, ValidationConfig, BatchIngestionConfig,
    PersistenceConfig, CrossValidationConfig,
};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex, sha256_hex};
pub use registry::SourceRegistry;
pub use progress::{ProgressEvent, ProgressSender, ProgressStage};
pub use acquisition::{
    AcquisitionStores, ChecksumCache, ChangeDetector, Downloader, ChecksumManifest,
    ManifestPolicy, DeadLetterQueue, CheckpointStore, IngestOrchestrator, BatchOutcome,
    CancelFlag,
};
pub use validate::{
    PostDownloadValidator, PostDownloadResult,
    GeoidValidator, CountValidator, SchoolSystemValidator, CoverageValidator,
    TopologyValidator, HaltGates,
};
pub use normalize::Normalizer;
pub use commit::{encode_leaf, MerkleTree, SnapshotArchive};
pub use fetch::{BoundaryFetcher, FetchedLayer, InMemoryFetcher, HttpFetcher};
pub use builder::{AtlasBuilder, BuildScope, BuildResult};
pub use lookup::{LookupService, LookupHit, LookupMetricsSnapshot, PointCacheConfig};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all atlas kernel types.
/// Increment on breaking changes to any schema type.
pub const ATLAS_SCHEMA_VERSION: &str = "1.0.0";

/// Identifier of the commitment scheme carried in every snapshot record.
/// Downstream verifiers must agree on this out-of-band.
pub const TREE_TYPE: &str = "merkle-sha256-v1";

/// Fixed coordinate precision (decimal places) used in leaf encoding.
pub const LEAF_COORD_PRECISION: u32 = 7;
