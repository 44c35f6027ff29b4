//! Validation engine.
//!
//! Two tiers of checks run between acquisition and commitment:
//!
//! 1. [`PostDownloadValidator`] — five structural checks on each freshly
//!    parsed FeatureCollection, yielding an accept/reject decision plus a
//!    confidence score.
//! 2. Layer validators — GEOID format, expected counts, school-district
//!    multi-system overlap rules, state coverage, and topology analysis,
//!    each feeding the per-layer [`crate::types::ValidationReport`] and the
//!    configurable [`HaltGates`].

pub mod post_download;
pub mod geoid;
pub mod counts;
pub mod school;
pub mod coverage;
pub mod topology;
pub mod halt;

pub use post_download::{PostDownloadValidator, PostDownloadResult};
pub use geoid::GeoidValidator;
pub use counts::{CountValidator, CountFinding};
pub use school::{SchoolSystemValidator, SchoolFinding, SchoolSystemSets};
pub use coverage::{CoverageValidator, CoverageFinding};
pub use topology::TopologyValidator;
pub use halt::HaltGates;
