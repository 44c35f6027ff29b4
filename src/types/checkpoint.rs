//! Batch checkpoint records.
//!
//! One checkpoint per batch job. The orchestrator rewrites the checkpoint
//! after every completed state so interrupted batches resume without
//! reprocessing completed work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options a batch was started with, persisted for resumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// State FIPS codes in the batch, in submission order.
    pub states: Vec<String>,
    /// Layer wire codes in the batch.
    pub layers: Vec<String>,
    /// Vintage year.
    pub year: u16,
    /// Maximum in-flight state tasks.
    pub max_concurrent: usize,
    /// Consecutive failures that trip the circuit breaker.
    pub circuit_breaker_threshold: u32,
}

/// Persisted state of one batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    /// Stable id, `ckpt_<epoch>_<random>`.
    pub id: String,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the checkpoint was last rewritten.
    pub updated_at: DateTime<Utc>,
    /// States that finished successfully. Never reprocessed.
    pub completed_states: Vec<String>,
    /// States that failed, with their error messages.
    pub failed_states: BTreeMap<String, String>,
    /// States not yet attempted.
    pub pending_states: Vec<String>,
    /// Originating options.
    pub options: BatchOptions,
    /// Whether the circuit breaker tripped.
    pub circuit_open: bool,
    /// Consecutive failure count at last write.
    pub consecutive_failures: u32,
    /// Boundaries accumulated by completed states.
    pub boundary_count: u64,
}

impl BatchCheckpoint {
    /// Create a fresh checkpoint for a new batch.
    pub fn new(id: String, options: BatchOptions, now: DateTime<Utc>) -> Self {
        let pending_states = options.states.clone();
        Self {
            id,
            started_at: now,
            updated_at: now,
            completed_states: Vec::new(),
            failed_states: BTreeMap::new(),
            pending_states,
            options,
            circuit_open: false,
            consecutive_failures: 0,
            boundary_count: 0,
        }
    }

    /// Record a state result and advance the queues.
    pub fn record_state(
        &mut self,
        state: &str,
        result: Result<u64, String>,
        now: DateTime<Utc>,
    ) {
        self.pending_states.retain(|s| s != state);
        match result {
            Ok(count) => {
                self.completed_states.push(state.to_string());
                self.failed_states.remove(state);
                self.boundary_count += count;
                self.consecutive_failures = 0;
            }
            Err(message) => {
                self.failed_states.insert(state.to_string(), message);
                self.consecutive_failures += 1;
            }
        }
        self.updated_at = now;
    }

    /// Work queue for a resume: pending plus, optionally, failed states.
    /// Completed states are never included.
    pub fn resume_queue(&self, retry_failed: bool) -> Vec<String> {
        let mut queue = self.pending_states.clone();
        if retry_failed {
            for state in self.failed_states.keys() {
                if !queue.contains(state) {
                    queue.push(state.clone());
                }
            }
        }
        queue.retain(|s| !self.completed_states.contains(s));
        queue
    }
}
