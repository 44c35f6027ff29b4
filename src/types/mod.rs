//! Core types for the atlas kernel.

pub mod layer;
pub mod geometry;
pub mod boundary;
pub mod source;
pub mod change;
pub mod dlq;
pub mod checkpoint;
pub mod snapshot;
pub mod report;

pub use layer::{Layer, BoundaryLevel, AuthorityLevel, LegalStatus, UpdateTrigger};
pub use geometry::{BoundaryGeometry, GeometryError};
pub use boundary::{BoundaryInvariantError, CanonicalBoundary, Provenance};
pub use source::{SourceId, BoundarySource, GeoidFormat};
pub use change::{ChangeKind, ChangeReport, ChecksumEntry};
pub use dlq::{FailedDownload, DownloadStatus};
pub use checkpoint::{BatchCheckpoint, BatchOptions};
pub use snapshot::{AtlasSnapshot, CrossValidationStatus};
pub use report::{
    ValidationReport, CountCheck, TopologyCheck, CoordinateCheck, OverlapFinding,
};
