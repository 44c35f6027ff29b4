//! Checkpoint store for batch jobs.
//!
//! One JSON file per checkpoint, written atomically after every state
//! completes so interrupted batches can resume.

use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::AtlasError;
use crate::types::{BatchCheckpoint, BatchOptions};

/// Directory-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Allocate a new checkpoint id: `ckpt_<epoch>_<random>`.
    ///
    /// The id is stable across attempts of the same batch.
    pub fn allocate_id() -> String {
        let epoch = Utc::now().timestamp();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("ckpt_{epoch}_{}", &suffix[..8])
    }

    /// Create and persist a fresh checkpoint for a new batch.
    pub fn create(&self, options: BatchOptions) -> Result<BatchCheckpoint, AtlasError> {
        let checkpoint = BatchCheckpoint::new(Self::allocate_id(), options, Utc::now());
        self.write(&checkpoint)?;
        Ok(checkpoint)
    }

    /// Persist a checkpoint atomically (write-to-temp-then-rename).
    pub fn write(&self, checkpoint: &BatchCheckpoint) -> Result<(), AtlasError> {
        std::fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        super::atomic_write(&self.path_for(&checkpoint.id), &bytes)?;
        Ok(())
    }

    /// Load a checkpoint by id.
    pub fn load(&self, id: &str) -> Result<BatchCheckpoint, AtlasError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(AtlasError::CheckpointNotFound(id.to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// List checkpoint ids present in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, AtlasError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(".json") {
                    if id.starts_with("ckpt_") {
                        ids.push(id.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
