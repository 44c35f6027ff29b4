//! Read-only point-in-polygon lookup against a committed snapshot.
//!
//! ## Purpose
//!
//! Answers "which district contains (lat, lon)?" with low latency:
//! a bounding-box R-tree narrows candidates, strict point-in-polygon on the
//! canonical geometry decides, and a TTL'd LRU cache short-circuits repeat
//! queries. The goal is to make lookups **cheap enough that callers never
//! cache around the service**.
//!
//! ## Contract
//!
//! - At most one district is returned. With overlapping candidates the
//!   lowest boundary id wins (candidates are tested in ascending id order),
//!   and callers may filter by layer.
//! - Malformed geometry rows are logged and skipped at load; a lookup never
//!   surfaces internal errors for well-formed coordinates.
//! - Snapshot swaps are atomic: a lookup sees the old snapshot or the new
//!   one, never a mix.

pub mod cache;
pub mod metrics;

pub use cache::{PointCache, PointCacheConfig};
pub use metrics::{LookupMetrics, LookupMetricsSnapshot};

use parking_lot::RwLock;
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::commit::SnapshotArchive;
use crate::error::AtlasError;
use crate::types::{AtlasSnapshot, BoundaryLevel, CanonicalBoundary};

/// One indexed boundary: bbox envelope plus its position in the sorted
/// boundary table.
#[derive(Debug, Clone)]
struct IndexedBoundary {
    envelope: AABB<[f64; 2]>,
    /// Index into `SnapshotIndex::boundaries` (sorted by id).
    slot: usize,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable in-memory index over one snapshot.
struct SnapshotIndex {
    snapshot: AtlasSnapshot,
    /// Boundaries sorted by id; slot order is id order.
    boundaries: Vec<CanonicalBoundary>,
    tree: RTree<IndexedBoundary>,
}

impl SnapshotIndex {
    fn build(archive: SnapshotArchive) -> Self {
        let mut boundaries = archive.boundaries;
        boundaries.sort();

        let mut objects = Vec::with_capacity(boundaries.len());
        let mut skipped = 0usize;
        for (slot, boundary) in boundaries.iter().enumerate() {
            if boundary.geometry.validate().is_err() {
                warn!(id = %boundary.id, "skipping malformed geometry at load");
                skipped += 1;
                continue;
            }
            match boundary.geometry.bbox() {
                Some((min_lon, min_lat, max_lon, max_lat)) => {
                    objects.push(IndexedBoundary {
                        envelope: AABB::from_corners([min_lon, min_lat], [max_lon, max_lat]),
                        slot,
                    });
                }
                None => {
                    warn!(id = %boundary.id, "skipping boundary with no bbox at load");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "boundaries excluded from the spatial index");
        }

        Self {
            snapshot: archive.snapshot,
            boundaries,
            tree: RTree::bulk_load(objects),
        }
    }

    /// Candidates whose bbox contains the point, in ascending id order.
    fn candidates(&self, lon: f64, lat: f64) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .map(|obj| obj.slot)
            .collect();
        // Boundaries are in id order, so slot order is id order.
        slots.sort_unstable();
        slots
    }
}

/// A successful lookup hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupHit {
    /// Id of the containing boundary.
    pub id: String,
    /// Its human-readable name.
    pub name: String,
    /// Its level.
    pub level: BoundaryLevel,
}

/// The lookup service.
///
/// Thread-safe: the snapshot handle swaps atomically under a read-write
/// lock, the cache and metrics take their own fine-grained locks.
pub struct LookupService {
    index: RwLock<Option<Arc<SnapshotIndex>>>,
    cache: PointCache,
    metrics: LookupMetrics,
}

impl LookupService {
    /// An empty service with the given cache configuration.
    pub fn new(cache_config: PointCacheConfig) -> Self {
        Self {
            index: RwLock::new(None),
            cache: PointCache::new(cache_config),
            metrics: LookupMetrics::new(),
        }
    }

    /// Load a snapshot archive, replacing any current snapshot atomically.
    pub fn load_snapshot(&self, archive: SnapshotArchive) {
        let index = Arc::new(SnapshotIndex::build(archive));
        info!(
            snapshot = %index.snapshot.snapshot_id,
            boundaries = index.boundaries.len(),
            "snapshot loaded into lookup service"
        );
        *self.index.write() = Some(index);
        self.cache.clear();
    }

    /// Load a snapshot archive from a directory on disk.
    pub fn load_snapshot_from(&self, dir: &std::path::Path) -> Result<(), AtlasError> {
        let archive = SnapshotArchive::load_from(dir)?;
        self.load_snapshot(archive);
        Ok(())
    }

    /// The currently served snapshot record, if any.
    pub fn snapshot(&self) -> Option<AtlasSnapshot> {
        self.index.read().as_ref().map(|i| i.snapshot.clone())
    }

    /// Which district contains (lat, lon)?
    ///
    /// Returns `Ok(None)` for a well-formed point outside every boundary.
    /// Raises [`AtlasError::InvalidCoordinates`] for non-finite or
    /// out-of-range input.
    pub fn lookup(&self, lat: f64, lon: f64) -> Result<Option<LookupHit>, AtlasError> {
        self.lookup_in_layer(lat, lon, None)
    }

    /// [`Self::lookup`] restricted to one boundary level.
    pub fn lookup_in_layer(
        &self,
        lat: f64,
        lon: f64,
        level: Option<BoundaryLevel>,
    ) -> Result<Option<LookupHit>, AtlasError> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(AtlasError::InvalidCoordinates { lat, lon });
        }

        let started = Instant::now();

        if let Some(cached) = self.cache.get(lat, lon, level) {
            self.metrics.record_hit(started.elapsed());
            return Ok(cached);
        }

        // Hold the snapshot Arc for the duration of this request only.
        let index = self.index.read().clone();
        let result = index.as_ref().and_then(|index| {
            let slots = index.candidates(lon, lat);
            slots.into_iter().find_map(|slot| {
                let boundary = &index.boundaries[slot];
                if let Some(level) = level {
                    if boundary.level != level {
                        return None;
                    }
                }
                boundary
                    .geometry
                    .contains_point(lon, lat)
                    .then(|| LookupHit {
                        id: boundary.id.clone(),
                        name: boundary.name.clone(),
                        level: boundary.level,
                    })
            })
        });

        self.cache.put(lat, lon, level, result.clone());
        self.metrics.record_miss(started.elapsed());
        Ok(result)
    }

    /// Current metrics snapshot.
    pub fn metrics(&self) -> LookupMetricsSnapshot {
        self.metrics.snapshot(self.cache.len())
    }
}
