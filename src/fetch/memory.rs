//! In-memory fetcher for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::acquisition::CancelFlag;
use crate::canonical::sha256_hex;
use crate::error::AtlasError;
use crate::types::{BoundarySource, SourceId};

use super::{parse_feature_collection, BoundaryFetcher, FetchedLayer};

/// Deterministic fixture-backed fetcher.
///
/// Uses BTreeMap for deterministic iteration and a fixed retrieval
/// timestamp so repeated fetches are byte-for-byte identical.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    fixtures: Mutex<BTreeMap<String, String>>,
    retrieved_at: DateTime<Utc>,
}

impl InMemoryFetcher {
    /// Create an empty fetcher with a fixed retrieval timestamp.
    pub fn new() -> Self {
        Self {
            fixtures: Mutex::new(BTreeMap::new()),
            retrieved_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }

    /// Register raw GeoJSON text for a source id.
    pub fn insert(&self, id: &SourceId, raw_geojson: impl Into<String>) {
        self.fixtures
            .lock()
            .insert(id.as_str().to_string(), raw_geojson.into());
    }

    /// Number of registered fixtures.
    pub fn len(&self) -> usize {
        self.fixtures.lock().len()
    }

    /// Whether no fixtures are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BoundaryFetcher for InMemoryFetcher {
    async fn fetch(
        &self,
        source: &BoundarySource,
        cancel: &CancelFlag,
    ) -> Result<FetchedLayer, AtlasError> {
        if cancel.is_cancelled() {
            return Err(cancel.as_error(&source.state_fips));
        }
        let raw = self
            .fixtures
            .lock()
            .get(source.id().as_str())
            .cloned()
            .ok_or_else(|| {
                AtlasError::NotFound(format!("no fixture for {} (HTTP 404)", source.id()))
            })?;
        let features = parse_feature_collection(&raw)?;
        Ok(FetchedLayer {
            source: source.clone(),
            features,
            content_sha256: sha256_hex(raw.as_bytes()),
            retrieved_at: self.retrieved_at,
        })
    }
}
