//! Atlas builder: the full-rebuild entry point.
//!
//! Drives fetch → post-download validation → layer validation →
//! normalization → cross-validation → commitment for a requested scope.
//! Every build is a full rebuild of its scope; there is no incremental
//! path. Partial builds never produce a snapshot.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use async_trait::async_trait;

use crate::acquisition::{
    orchestrator::StateProcessor, BatchOutcome, CancelFlag, CheckpointStore, IngestOrchestrator,
};
use crate::commit::commit_snapshot;
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::fetch::BoundaryFetcher;
use crate::normalize::Normalizer;
use crate::progress::{ProgressSender, ProgressStage};
use crate::registry::SourceRegistry;
use crate::types::{
    AtlasSnapshot, BatchOptions, CanonicalBoundary, CountCheck, CrossValidationStatus, Layer,
    ValidationReport,
};
use crate::validate::{
    CountFinding, CountValidator, CoverageValidator, GeoidValidator, HaltGates,
    PostDownloadValidator, SchoolSystemValidator, TopologyValidator,
};
use crate::validate::school::SchoolSystemSets;

/// Scope of one build: which states, layers, and vintage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildScope {
    /// State FIPS codes.
    pub states: Vec<String>,
    /// Layers to ingest.
    pub layers: Vec<Layer>,
    /// Vintage year.
    pub year: u16,
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildResult {
    /// The committed snapshot record.
    pub snapshot: AtlasSnapshot,
    /// Canonical boundaries, sorted by id.
    pub boundaries: Vec<CanonicalBoundary>,
    /// Per-(state, layer) validation reports.
    pub reports: Vec<ValidationReport>,
    /// Checkpoint id of the underlying batch.
    pub checkpoint_id: String,
}

/// Shared mutable state filled by state tasks during a build.
#[derive(Default)]
struct BuildScratch {
    layer_membership: BTreeMap<String, Layer>,
    reports: Vec<ValidationReport>,
    count_findings: Vec<CountFinding>,
    halt: Option<(String, String)>,
}

/// The atlas builder.
pub struct AtlasBuilder<F: BoundaryFetcher> {
    fetcher: Arc<F>,
    registry: Arc<SourceRegistry>,
    config: AtlasConfig,
    normalizer: Normalizer,
    progress: ProgressSender,
    /// State polygons for coverage checks, keyed by state FIPS. Coverage is
    /// skipped for states without one.
    state_polygons: BTreeMap<String, geo::MultiPolygon<f64>>,
    scratch: Mutex<BuildScratch>,
}

impl<F: BoundaryFetcher + 'static> AtlasBuilder<F> {
    /// Create a builder.
    pub fn new(
        fetcher: Arc<F>,
        registry: Arc<SourceRegistry>,
        config: AtlasConfig,
        progress: ProgressSender,
    ) -> Self {
        Self {
            fetcher,
            registry,
            config,
            normalizer: Normalizer::census(),
            progress,
            state_polygons: BTreeMap::new(),
            scratch: Mutex::new(BuildScratch::default()),
        }
    }

    /// Attach state polygons so coverage validation can run.
    pub fn with_state_polygons(
        mut self,
        polygons: BTreeMap<String, geo::MultiPolygon<f64>>,
    ) -> Self {
        self.state_polygons = polygons;
        self
    }

    /// Build the atlas for a scope. Always a full rebuild.
    pub async fn build(self: &Arc<Self>, scope: BuildScope) -> Result<BuildResult, AtlasError> {
        let cancel = CancelFlag::new();
        self.build_with_cancel(scope, &cancel).await
    }

    /// Build with an external cancellation signal.
    pub async fn build_with_cancel(
        self: &Arc<Self>,
        scope: BuildScope,
        cancel: &CancelFlag,
    ) -> Result<BuildResult, AtlasError> {
        if scope.states.is_empty() || scope.layers.is_empty() {
            return Err(AtlasError::Configuration(
                "build scope must name at least one state and one layer".to_string(),
            ));
        }
        *self.scratch.lock() = BuildScratch::default();

        let options = BatchOptions {
            states: scope.states.clone(),
            layers: scope.layers.iter().map(|l| l.code().to_string()).collect(),
            year: scope.year,
            max_concurrent: self.config.batch_ingestion.max_concurrent_states,
            circuit_breaker_threshold: self.config.batch_ingestion.circuit_breaker_threshold,
        };
        let orchestrator = self.orchestrator();
        let started_at = Utc::now();
        let outcome = orchestrator.ingest_batch(options, cancel).await?;
        self.finish(scope, outcome, started_at)
    }

    /// Resume an interrupted build from its checkpoint.
    pub async fn resume(
        self: &Arc<Self>,
        checkpoint_id: &str,
        retry_failed: bool,
        cancel: &CancelFlag,
    ) -> Result<BuildResult, AtlasError> {
        *self.scratch.lock() = BuildScratch::default();
        let orchestrator = self.orchestrator();
        let started_at = Utc::now();
        let outcome = orchestrator
            .resume_from_checkpoint(checkpoint_id, retry_failed, cancel)
            .await?;
        let checkpoint = &outcome.checkpoint;
        let scope = BuildScope {
            states: checkpoint.options.states.clone(),
            layers: checkpoint
                .options
                .layers
                .iter()
                .filter_map(|c| Layer::from_code(c))
                .collect(),
            year: checkpoint.options.year,
        };
        self.finish(scope, outcome, started_at)
    }

    fn orchestrator(self: &Arc<Self>) -> IngestOrchestrator<Self> {
        IngestOrchestrator::new(
            self.clone(),
            CheckpointStore::new(self.config.batch_ingestion.checkpoint_dir.clone()),
            self.progress.clone(),
        )
    }

    fn finish(
        &self,
        scope: BuildScope,
        outcome: BatchOutcome,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<BuildResult, AtlasError> {
        let checkpoint = outcome.checkpoint;

        // A tripped halt gate outranks every other outcome.
        if let Some((gate, detail)) = self.scratch.lock().halt.take() {
            return Err(AtlasError::ValidationHalted {
                gate: leak_gate(gate),
                detail,
            });
        }

        if outcome.aborted {
            return Err(AtlasError::CircuitOpen {
                checkpoint_id: checkpoint.id,
                consecutive_failures: checkpoint.consecutive_failures,
            });
        }

        if checkpoint.completed_states.is_empty() {
            let summary = checkpoint
                .failed_states
                .iter()
                .map(|(state, err)| format!("{state}: {err}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AtlasError::AllLayersFailed(format!(
                "checkpoint {}: {summary}",
                checkpoint.id
            )));
        }

        let mut boundaries = outcome.boundaries;
        let (layer_membership, reports, cross_validation_status) = {
            let mut scratch = self.scratch.lock();
            let status = self.cross_validation_status(&scratch.count_findings);
            (
                std::mem::take(&mut scratch.layer_membership),
                std::mem::take(&mut scratch.reports),
                status,
            )
        };

        self.progress.emit_stage(
            ProgressStage::Commit,
            None,
            None,
            boundaries.len() as u64,
        );
        // States are derived from the boundaries actually committed: a
        // resumed batch commits what it ingested in this run.
        let states_included: Vec<String> = boundaries
            .iter()
            .map(|b| b.state_fips().to_string())
            .collect();
        let (snapshot, _tree) = commit_snapshot(
            &mut boundaries,
            &layer_membership,
            scope.year,
            states_included,
            scope.layers.iter().map(|l| l.code().to_string()).collect(),
            started_at,
            cross_validation_status,
        )?;

        info!(
            snapshot = %snapshot.snapshot_id,
            root = %snapshot.merkle_root,
            boundaries = snapshot.leaf_count,
            "atlas committed"
        );
        Ok(BuildResult {
            snapshot,
            boundaries,
            reports,
            checkpoint_id: checkpoint.id,
        })
    }

    fn cross_validation_status(&self, findings: &[CountFinding]) -> CrossValidationStatus {
        if !self.config.cross_validation.enabled {
            return CrossValidationStatus::Disabled;
        }
        if findings.is_empty() {
            return CrossValidationStatus::Skipped;
        }
        let mismatched = findings
            .iter()
            .any(|f| matches!(f, CountFinding::Mismatch { .. }));
        let unknown = findings
            .iter()
            .any(|f| matches!(f, CountFinding::NoExpectation));
        if mismatched {
            CrossValidationStatus::FailedGraceful
        } else if unknown {
            CrossValidationStatus::Partial
        } else {
            CrossValidationStatus::Completed
        }
    }

    /// Process one layer for one state.
    async fn process_layer(
        &self,
        state_fips: &str,
        layer: Layer,
        year: u16,
        cancel: &CancelFlag,
    ) -> Result<Vec<CanonicalBoundary>, AtlasError> {
        let source = self
            .registry
            .source(layer, state_fips, year)
            .ok_or_else(|| {
                AtlasError::NotFound(format!("state {state_fips} not in registry (not found)"))
            })?;

        self.progress
            .emit_stage(ProgressStage::Fetch, Some(state_fips), Some(layer.code()), 0);
        let fetched = self.fetcher.fetch(&source, cancel).await?;

        // Post-download structural validation.
        self.progress.emit_stage(
            ProgressStage::Validate,
            Some(state_fips),
            Some(layer.code()),
            fetched.features.features.len() as u64,
        );
        let structural = PostDownloadValidator::new().validate(&fetched.features);
        if !structural.valid {
            return Err(AtlasError::Parse(format!(
                "{}: rejected by post-download validation: {}",
                source.id(),
                structural.issues.join("; ")
            )));
        }
        let min_confidence = (self.config.validation.min_pass_rate * 100.0) as u8;
        if structural.confidence < min_confidence {
            return Err(AtlasError::Parse(format!(
                "{}: confidence {} below minimum {min_confidence}",
                source.id(),
                structural.confidence
            )));
        }

        // Normalize.
        let boundaries = self.normalizer.normalize_collection(
            &fetched.features.features,
            &source,
            &fetched.content_sha256,
            fetched.retrieved_at,
        )?;
        self.progress.emit_stage(
            ProgressStage::Normalize,
            Some(state_fips),
            Some(layer.code()),
            boundaries.len() as u64,
        );

        // Layer validation: GEOID format + prefix.
        let gates = HaltGates::from_config(&self.config.validation);
        let ids: Vec<String> = boundaries.iter().map(|b| b.id.clone()).collect();
        let geoid = GeoidValidator::new(layer, source.geoid_format.clone())?;
        let geoid_findings = geoid.validate(&ids, state_fips);
        if !geoid_findings.is_empty() {
            warn!(
                source = %source.id(),
                count = geoid_findings.len(),
                "GEOID findings"
            );
        }

        // Topology + coordinates.
        let (topology, coordinates) = TopologyValidator::new().check(&boundaries);
        self.halting(gates.check_topology(layer.code(), &topology, &coordinates))?;

        // Expected-count cross-validation.
        let count_finding = if self.config.cross_validation.enabled {
            self.progress.emit_stage(
                ProgressStage::CrossValidate,
                Some(state_fips),
                Some(layer.code()),
                ids.len() as u64,
            );
            let validator = CountValidator::new(&self.registry);
            let finding = validator.check(layer, state_fips, year, ids.len() as u32);
            self.halting(gates.check_count(layer.code(), &finding))?;
            if self.config.cross_validation.fail_on_mismatch {
                if let CountFinding::Mismatch {
                    expected, actual, ..
                } = &finding
                {
                    return Err(AtlasError::Parse(format!(
                        "{}: count mismatch: expected {expected}, got {actual}",
                        source.id()
                    )));
                }
            }
            Some(finding)
        } else {
            None
        };

        // Assemble the per-layer report.
        let counts = CountCheck {
            expected: source.expected_count,
            actual: ids.len() as u32,
            missing_ids: Vec::new(),
            extra_ids: Vec::new(),
        };
        let quality_score = ValidationReport::score(&counts, &topology, &coordinates);
        let report = ValidationReport {
            layer: layer.code().to_string(),
            state_fips: state_fips.to_string(),
            summary: format!(
                "{}: {} boundaries, quality {quality_score}",
                source.id(),
                ids.len()
            ),
            counts,
            topology,
            coordinates,
            quality_score,
        };
        if quality_score < self.config.cross_validation.min_quality_score {
            warn!(source = %source.id(), quality_score, "quality below configured minimum");
        }

        let mut scratch = self.scratch.lock();
        for boundary in &boundaries {
            scratch.layer_membership.insert(boundary.id.clone(), layer);
        }
        scratch.reports.push(report);
        if let Some(finding) = count_finding {
            scratch.count_findings.push(finding);
        }
        Ok(boundaries)
    }

    /// Cross-layer checks that need a whole state's boundaries: school
    /// multi-system overlap rules and state-polygon coverage.
    fn check_state_invariants(
        &self,
        state_fips: &str,
        per_layer: &[(Layer, Vec<CanonicalBoundary>)],
    ) -> Result<(), AtlasError> {
        let gates = HaltGates::from_config(&self.config.validation);

        if per_layer.iter().any(|(layer, _)| layer.is_school()) {
            let mut sets = SchoolSystemSets::default();
            for (layer, boundaries) in per_layer {
                match layer {
                    Layer::UnifiedSchoolDistrict => sets.unified.extend(boundaries.iter().cloned()),
                    Layer::ElementarySchoolDistrict => {
                        sets.elementary.extend(boundaries.iter().cloned())
                    }
                    Layer::SecondarySchoolDistrict => {
                        sets.secondary.extend(boundaries.iter().cloned())
                    }
                    _ => {}
                }
            }
            let findings = SchoolSystemValidator::new(state_fips).check(&sets);
            if !findings.is_empty() {
                warn!(
                    state_fips,
                    count = findings.len(),
                    "forbidden school-system overlaps"
                );
            }
            self.halting(gates.check_school(state_fips, &findings))?;
        }

        if let Some(state_polygon) = self.state_polygons.get(state_fips) {
            let validator = CoverageValidator::new(state_polygon.clone());
            for (layer, boundaries) in per_layer {
                if boundaries.is_empty() || layer.is_school() {
                    continue;
                }
                let finding = validator.check(boundaries);
                if !finding.passes() {
                    warn!(
                        state_fips,
                        layer = layer.code(),
                        coverage = finding.coverage,
                        "layer does not cover the state"
                    );
                }
                self.halting(gates.check_coverage(state_fips, &finding))?;
            }
        }
        Ok(())
    }

    /// Record a halt (and cancel the batch) while passing the error through.
    fn halting(&self, result: Result<(), AtlasError>) -> Result<(), AtlasError> {
        if let Err(AtlasError::ValidationHalted { gate, detail }) = &result {
            let mut scratch = self.scratch.lock();
            if scratch.halt.is_none() {
                scratch.halt = Some((gate.to_string(), detail.clone()));
            }
        }
        result
    }
}

#[async_trait]
impl<F: BoundaryFetcher + 'static> StateProcessor for AtlasBuilder<F> {
    async fn process_state(
        &self,
        state_fips: &str,
        layers: &[Layer],
        year: u16,
        cancel: &CancelFlag,
    ) -> Result<Vec<CanonicalBoundary>, AtlasError> {
        let mut per_layer: Vec<(Layer, Vec<CanonicalBoundary>)> = Vec::new();
        for layer in layers {
            if cancel.is_cancelled() {
                return Err(cancel.as_error(state_fips));
            }
            match self.process_layer(state_fips, *layer, year, cancel).await {
                Ok(boundaries) => per_layer.push((*layer, boundaries)),
                Err(e) => {
                    // A tripped halt gate aborts the whole batch, not just
                    // this state.
                    if self.scratch.lock().halt.is_some() {
                        cancel.cancel();
                    }
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.check_state_invariants(state_fips, &per_layer) {
            if self.scratch.lock().halt.is_some() {
                cancel.cancel();
            }
            return Err(e);
        }

        Ok(per_layer.into_iter().flat_map(|(_, b)| b).collect())
    }
}

/// Halt gate names are a closed set; map the owned copy back to 'static.
fn leak_gate(gate: String) -> &'static str {
    match gate.as_str() {
        "halt_on_topology" => "halt_on_topology",
        "halt_on_completeness" => "halt_on_completeness",
        "halt_on_coordinates" => "halt_on_coordinates",
        "halt_on_overlap" => "halt_on_overlap",
        "halt_on_coverage" => "halt_on_coverage",
        _ => "halt_on_count_mismatch",
    }
}
