//! Batch ingestion orchestrator.
//!
//! Schedules per-state tasks with bounded parallelism, maintains a
//! consecutive-failure circuit breaker, and rewrites the checkpoint after
//! every state so interrupted batches resume without reprocessing
//! completed work.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::AtlasError;
use crate::progress::{ProgressSender, ProgressStage};
use crate::types::{BatchCheckpoint, BatchOptions, CanonicalBoundary, Layer};

use super::checkpoint::CheckpointStore;

/// Cooperative cancellation signal shared across batch tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Error to record when a task observes the flag.
    pub fn as_error(&self, state: &str) -> AtlasError {
        AtlasError::Cancelled(format!("state {state} cancelled"))
    }
}

/// Seam for processing one state's layers into canonical boundaries.
///
/// The production implementation is the atlas builder's fetch → validate →
/// normalize pipeline; tests script outcomes.
#[async_trait]
pub trait StateProcessor: Send + Sync {
    /// Process every requested layer for one state.
    async fn process_state(
        &self,
        state_fips: &str,
        layers: &[Layer],
        year: u16,
        cancel: &CancelFlag,
    ) -> Result<Vec<CanonicalBoundary>, AtlasError>;
}

/// Result of one batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Final checkpoint state (also persisted).
    pub checkpoint: BatchCheckpoint,
    /// Boundaries accumulated from completed states.
    pub boundaries: Vec<CanonicalBoundary>,
    /// True when the circuit breaker aborted the batch.
    pub aborted: bool,
}

/// Orchestrates batch ingestion over (state × layer) pairs.
pub struct IngestOrchestrator<P: StateProcessor> {
    processor: Arc<P>,
    store: CheckpointStore,
    progress: ProgressSender,
}

impl<P: StateProcessor + 'static> IngestOrchestrator<P> {
    /// Create an orchestrator over a processor and a checkpoint store.
    pub fn new(processor: Arc<P>, store: CheckpointStore, progress: ProgressSender) -> Self {
        Self {
            processor,
            store,
            progress,
        }
    }

    /// Run a fresh batch over every state in the options.
    pub async fn ingest_batch(
        &self,
        options: BatchOptions,
        cancel: &CancelFlag,
    ) -> Result<BatchOutcome, AtlasError> {
        let checkpoint = self.store.create(options)?;
        let queue = checkpoint.pending_states.clone();
        self.run(checkpoint, queue, cancel).await
    }

    /// Resume an interrupted batch from its checkpoint.
    ///
    /// Clears `circuit_open`, forms the work queue from pending states plus
    /// (when `retry_failed`) failed states, and never reprocesses completed
    /// states.
    pub async fn resume_from_checkpoint(
        &self,
        checkpoint_id: &str,
        retry_failed: bool,
        cancel: &CancelFlag,
    ) -> Result<BatchOutcome, AtlasError> {
        let mut checkpoint = self.store.load(checkpoint_id)?;
        checkpoint.circuit_open = false;
        checkpoint.consecutive_failures = 0;
        let queue = checkpoint.resume_queue(retry_failed);
        if retry_failed {
            // Retried states leave the failed set; a fresh failure re-adds them.
            for state in &queue {
                checkpoint.failed_states.remove(state);
            }
            checkpoint.pending_states = queue.clone();
        }
        self.store.write(&checkpoint)?;
        info!(checkpoint = %checkpoint.id, states = queue.len(), "resuming batch");
        self.run(checkpoint, queue, cancel).await
    }

    async fn run(
        &self,
        mut checkpoint: BatchCheckpoint,
        queue: Vec<String>,
        cancel: &CancelFlag,
    ) -> Result<BatchOutcome, AtlasError> {
        let layers: Vec<Layer> = checkpoint
            .options
            .layers
            .iter()
            .filter_map(|c| Layer::from_code(c))
            .collect();
        if layers.is_empty() {
            return Err(AtlasError::Configuration(
                "batch options name no known layers".to_string(),
            ));
        }
        let year = checkpoint.options.year;
        let threshold = checkpoint.options.circuit_breaker_threshold;
        let max_concurrent = checkpoint.options.max_concurrent.max(1);

        let mut boundaries: Vec<CanonicalBoundary> = Vec::new();
        let mut pending: std::collections::VecDeque<String> = queue.into();
        let mut in_flight: JoinSet<(String, Result<Vec<CanonicalBoundary>, AtlasError>)> =
            JoinSet::new();

        loop {
            // Schedule while capacity remains and the breaker is closed.
            while in_flight.len() < max_concurrent && !checkpoint.circuit_open {
                let Some(state) = pending.pop_front() else { break };
                let processor = self.processor.clone();
                let layers = layers.clone();
                let cancel = cancel.clone();
                self.progress
                    .emit_stage(ProgressStage::Fetch, Some(state.as_str()), None, 0);
                in_flight.spawn(async move {
                    if cancel.is_cancelled() {
                        let err = cancel.as_error(&state);
                        return (state, Err(err));
                    }
                    let result = processor
                        .process_state(&state, &layers, year, &cancel)
                        .await;
                    (state, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else { break };
            let (state, result) = joined
                .map_err(|e| AtlasError::Configuration(format!("task join failure: {e}")))?;

            match result {
                Ok(mut batch) => {
                    let count = batch.len() as u64;
                    info!(state = %state, count, "state completed");
                    checkpoint.record_state(&state, Ok(count), Utc::now());
                    boundaries.append(&mut batch);
                    self.progress
                        .emit_stage(ProgressStage::Normalize, Some(state.as_str()), None, count);
                }
                Err(e) => {
                    warn!(state = %state, error = %e, "state failed");
                    checkpoint.record_state(&state, Err(e.to_string()), Utc::now());
                    if checkpoint.consecutive_failures >= threshold {
                        checkpoint.circuit_open = true;
                        // Abandon in-flight work; unrecorded states stay pending.
                        in_flight.shutdown().await;
                    }
                }
            }
            self.store.write(&checkpoint)?;

            if checkpoint.circuit_open && in_flight.is_empty() && pending.is_empty() {
                break;
            }
            if checkpoint.circuit_open {
                // Drain whatever the shutdown left, without scheduling more.
                continue;
            }
        }

        // States never scheduled remain pending in the persisted record.
        let aborted = checkpoint.circuit_open;
        if aborted {
            warn!(
                checkpoint = %checkpoint.id,
                failures = checkpoint.consecutive_failures,
                "batch aborted by circuit breaker"
            );
        }
        self.store.write(&checkpoint)?;

        Ok(BatchOutcome {
            checkpoint,
            boundaries,
            aborted,
        })
    }

    /// The checkpoint store backing this orchestrator.
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }
}
