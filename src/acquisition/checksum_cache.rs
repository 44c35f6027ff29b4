//! Persisted checksum cache for change detection.
//!
//! On-disk shape:
//!
//! ```json
//! { "last_checked": "...", "sources": { "<layer>:<fips>:<year>": { "etag": ..., "last_modified": ..., "checked_at": ... } } }
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::AtlasError;
use crate::types::{ChecksumEntry, SourceId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheDocument {
    last_checked: Option<DateTime<Utc>>,
    sources: BTreeMap<String, ChecksumEntry>,
}

/// File-backed cache of the last observed validator per source.
///
/// Single-writer: all mutation goes through the internal mutex, and every
/// mutation rewrites the document atomically.
#[derive(Debug)]
pub struct ChecksumCache {
    path: PathBuf,
    doc: Mutex<CacheDocument>,
}

impl ChecksumCache {
    /// Open the cache at `path`, loading the existing document if present.
    pub fn open(path: PathBuf) -> Result<Self, AtlasError> {
        let doc = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            CacheDocument::default()
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// An in-memory cache that never persists (tests, dry runs).
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            doc: Mutex::new(CacheDocument::default()),
        }
    }

    /// The persisted entry for a source, if any.
    pub fn get(&self, id: &SourceId) -> Option<ChecksumEntry> {
        self.doc.lock().sources.get(id.as_str()).cloned()
    }

    /// Record the observed validators for a source and persist.
    pub fn put(&self, id: &SourceId, entry: ChecksumEntry) -> Result<(), AtlasError> {
        let mut doc = self.doc.lock();
        doc.sources.insert(id.as_str().to_string(), entry);
        doc.last_checked = Some(Utc::now());
        self.flush_locked(&doc)
    }

    /// Number of sources with persisted validators.
    pub fn len(&self) -> usize {
        self.doc.lock().sources.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flush_locked(&self, doc: &CacheDocument) -> Result<(), AtlasError> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        super::atomic_write(&self.path, &bytes)?;
        Ok(())
    }
}
