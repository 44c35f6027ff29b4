//! File-backed dead-letter queue for terminal download failures.
//!
//! One row per source, keyed by `sha256(url || layer || state || year)`.
//! Repeat failures of the same source increment `attempt_count` on the same
//! row; status flips to `Exhausted` when the attempt budget is spent.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::AtlasError;
use crate::types::{BoundarySource, DownloadStatus, FailedDownload};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DlqDocument {
    rows: BTreeMap<String, FailedDownload>,
}

/// Persistent store of terminal-failure download tasks awaiting retry.
#[derive(Debug)]
pub struct DeadLetterQueue {
    path: PathBuf,
    doc: Mutex<DlqDocument>,
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_multiplier: f64,
}

impl DeadLetterQueue {
    /// Open the queue at `path`, loading existing rows if present.
    pub fn open(
        path: PathBuf,
        max_attempts: u32,
        backoff_base_ms: u64,
        backoff_multiplier: f64,
    ) -> Result<Self, AtlasError> {
        let doc = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            DlqDocument::default()
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
            max_attempts,
            backoff_base_ms,
            backoff_multiplier,
        })
    }

    /// An in-memory queue that never persists (tests, dry runs).
    pub fn ephemeral(max_attempts: u32, backoff_base_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            path: PathBuf::new(),
            doc: Mutex::new(DlqDocument::default()),
            max_attempts,
            backoff_base_ms,
            backoff_multiplier,
        }
    }

    /// Record one terminal failure for a source.
    ///
    /// Creates the row on first failure; subsequent failures increment
    /// `attempt_count` on the same row and recompute `next_retry_at` with
    /// exponential backoff.
    pub fn record_failure(
        &self,
        source: &BoundarySource,
        job_id: &str,
        last_error: &str,
    ) -> Result<FailedDownload, AtlasError> {
        let id_hash = FailedDownload::id_hash_for(
            &source.url,
            source.layer.code(),
            &source.state_fips,
            source.vintage,
        );
        let now = Utc::now();

        let mut doc = self.doc.lock();
        let row = doc
            .rows
            .entry(id_hash.clone())
            .or_insert_with(|| FailedDownload {
                id_hash: id_hash.clone(),
                job_id: job_id.to_string(),
                url: source.url.clone(),
                layer: source.layer.code().to_string(),
                state_fips: source.state_fips.clone(),
                year: source.vintage,
                attempt_count: 0,
                max_attempts: self.max_attempts,
                status: DownloadStatus::Pending,
                last_error: String::new(),
                next_retry_at: now,
                created_at: now,
                resolved_at: None,
            });

        row.attempt_count += 1;
        row.job_id = job_id.to_string();
        row.last_error = last_error.to_string();
        row.next_retry_at = now
            + FailedDownload::backoff_delay(
                self.backoff_base_ms,
                self.backoff_multiplier,
                row.attempt_count,
            );
        row.status = if row.attempt_count >= self.max_attempts {
            DownloadStatus::Exhausted
        } else {
            DownloadStatus::Retrying
        };

        let snapshot = row.clone();
        self.flush_locked(&doc)?;
        Ok(snapshot)
    }

    /// Mark a row resolved after a later attempt succeeded.
    pub fn mark_resolved(&self, id_hash: &str) -> Result<(), AtlasError> {
        let mut doc = self.doc.lock();
        if let Some(row) = doc.rows.get_mut(id_hash) {
            row.status = DownloadStatus::Resolved;
            row.resolved_at = Some(Utc::now());
        }
        self.flush_locked(&doc)
    }

    /// Fetch a row by idempotency key.
    pub fn get(&self, id_hash: &str) -> Option<FailedDownload> {
        self.doc.lock().rows.get(id_hash).cloned()
    }

    /// Rows eligible for retry now: retrying status and due.
    pub fn due_for_retry(&self) -> Vec<FailedDownload> {
        let now = Utc::now();
        self.doc
            .lock()
            .rows
            .values()
            .filter(|r| r.status == DownloadStatus::Retrying && r.next_retry_at <= now)
            .cloned()
            .collect()
    }

    /// Total rows in the queue.
    pub fn len(&self) -> usize {
        self.doc.lock().rows.len()
    }

    /// Whether the queue holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flush_locked(&self, doc: &DlqDocument) -> Result<(), AtlasError> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceRegistry;
    use crate::types::Layer;

    fn wyoming_cd() -> BoundarySource {
        SourceRegistry::new()
            .source(Layer::CongressionalDistrict, "56", 2024)
            .unwrap()
    }

    #[test]
    fn test_repeat_failures_share_one_row() {
        let dlq = DeadLetterQueue::ephemeral(5, 1_000, 2.0);
        let source = wyoming_cd();
        for _ in 0..3 {
            dlq.record_failure(&source, "job_1", "HTTP 404").unwrap();
        }
        assert_eq!(dlq.len(), 1);
        let row = dlq.record_failure(&source, "job_1", "HTTP 404").unwrap();
        assert_eq!(row.attempt_count, 4);
        assert_eq!(row.status, DownloadStatus::Retrying);
    }

    #[test]
    fn test_status_flips_to_exhausted_at_max_attempts() {
        let dlq = DeadLetterQueue::ephemeral(3, 1_000, 2.0);
        let source = wyoming_cd();
        dlq.record_failure(&source, "j", "x").unwrap();
        dlq.record_failure(&source, "j", "x").unwrap();
        let row = dlq.record_failure(&source, "j", "x").unwrap();
        assert_eq!(row.attempt_count, 3);
        assert_eq!(row.status, DownloadStatus::Exhausted);
    }

    #[test]
    fn test_backoff_pushes_next_retry_out() {
        let dlq = DeadLetterQueue::ephemeral(10, 60_000, 2.0);
        let source = wyoming_cd();
        let first = dlq.record_failure(&source, "j", "x").unwrap();
        let second = dlq.record_failure(&source, "j", "x").unwrap();
        assert!(second.next_retry_at > first.next_retry_at);
        // Nothing is due yet with a minute-scale base delay.
        assert!(dlq.due_for_retry().is_empty());
    }

    #[test]
    fn test_mark_resolved() {
        let dlq = DeadLetterQueue::ephemeral(3, 1_000, 2.0);
        let source = wyoming_cd();
        let row = dlq.record_failure(&source, "j", "x").unwrap();
        dlq.mark_resolved(&row.id_hash).unwrap();
        let row = dlq.get(&row.id_hash).unwrap();
        assert_eq!(row.status, DownloadStatus::Resolved);
        assert!(row.resolved_at.is_some());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dlq.json");
        let source = wyoming_cd();
        let id_hash;
        {
            let dlq = DeadLetterQueue::open(path.clone(), 3, 1_000, 2.0).unwrap();
            id_hash = dlq.record_failure(&source, "j", "boom").unwrap().id_hash;
        }
        let reopened = DeadLetterQueue::open(path, 3, 1_000, 2.0).unwrap();
        let row = reopened.get(&id_hash).unwrap();
        assert_eq!(row.attempt_count, 1);
        assert_eq!(row.last_error, "boom");
    }
}
