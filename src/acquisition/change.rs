//! Upstream change detection.
//!
//! The detector issues conditional, metadata-only requests against each
//! source and emits a [`ChangeReport`] when the observed validator differs
//! from the persisted one. Strong ETags are preferred; Last-Modified is the
//! fallback validator.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AtlasError;
use crate::registry::SourceRegistry;
use crate::types::{BoundarySource, ChangeKind, ChangeReport, ChecksumEntry};

use super::checksum_cache::ChecksumCache;

/// Base backoff for validator probes, milliseconds.
const PROBE_BACKOFF_BASE_MS: u64 = 500;
/// Probe retry budget for network failures.
const PROBE_RETRIES: u32 = 3;

/// Result of one metadata-only probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// ETag header, verbatim.
    pub etag: Option<String>,
    /// Last-Modified header, verbatim.
    pub last_modified: Option<String>,
}

impl ProbeResponse {
    /// Whether the status is a success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam for issuing conditional metadata requests.
///
/// The production implementation is [`HttpProbe`]; tests script responses.
#[async_trait]
pub trait ValidatorProbe: Send + Sync {
    /// Issue one conditional request for `url`, sending `If-None-Match` /
    /// `If-Modified-Since` when prior validators are known.
    async fn probe(&self, url: &str, prior: &ChecksumEntry) -> Result<ProbeResponse, AtlasError>;
}

/// reqwest-backed probe issuing HEAD requests.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Build a probe with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, AtlasError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AtlasError::Configuration(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ValidatorProbe for HttpProbe {
    async fn probe(&self, url: &str, prior: &ChecksumEntry) -> Result<ProbeResponse, AtlasError> {
        let mut req = self.client.head(url);
        if let Some(etag) = &prior.etag {
            req = req.header(reqwest::header::IF_NONE_MATCH, etag);
        }
        if let Some(lm) = &prior.last_modified {
            req = req.header(reqwest::header::IF_MODIFIED_SINCE, lm);
        }
        let resp = req.send().await?;
        let header = |name: reqwest::header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Ok(ProbeResponse {
            status: resp.status().as_u16(),
            etag: header(reqwest::header::ETAG),
            last_modified: header(reqwest::header::LAST_MODIFIED),
        })
    }
}

/// Detects upstream changes for registered sources.
pub struct ChangeDetector<P: ValidatorProbe> {
    probe: P,
    cache: Arc<ChecksumCache>,
    registry: Arc<SourceRegistry>,
}

impl ChangeDetector<HttpProbe> {
    /// Production detector: HTTP probe plus the checksum cache opened from
    /// the persistence configuration.
    pub fn from_config(
        config: &crate::config::AtlasConfig,
        registry: Arc<SourceRegistry>,
    ) -> Result<Self, AtlasError> {
        let stores = super::AcquisitionStores::open(config)?;
        let probe = HttpProbe::new(Duration::from_millis(config.extraction.timeout_ms))?;
        Ok(Self::new(probe, stores.checksum_cache, registry))
    }
}

impl<P: ValidatorProbe> ChangeDetector<P> {
    /// Create a detector over a probe, a checksum cache, and the registry.
    pub fn new(probe: P, cache: Arc<ChecksumCache>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            probe,
            cache,
            registry,
        }
    }

    /// Check one source for an upstream change.
    ///
    /// Returns `Ok(None)` when nothing changed, the upstream answered
    /// non-2xx, or no validator is derivable. Network failures are retried
    /// up to three times with exponential backoff before surfacing.
    pub async fn check_for_change(
        &self,
        source: &BoundarySource,
    ) -> Result<Option<ChangeReport>, AtlasError> {
        let id = source.id();
        let prior = self.cache.get(&id).unwrap_or_default();

        let response = self.probe_with_retry(&source.url, &prior).await?;
        if !response.is_success() {
            debug!(source = %id, status = response.status, "non-2xx validator probe");
            return Ok(None);
        }

        // Strong validator preference: ETag over Last-Modified.
        let new_validator = match response
            .etag
            .as_deref()
            .or(response.last_modified.as_deref())
        {
            Some(v) => v.to_string(),
            None => {
                // No validator upstream. With a prior checksum on file we
                // treat this as unchanged rather than a spurious change.
                return Ok(None);
            }
        };

        let old_validator = prior.validator().map(str::to_string);
        let changed = old_validator.as_deref() != Some(new_validator.as_str());

        let entry = ChecksumEntry {
            etag: response.etag.clone(),
            last_modified: response.last_modified.clone(),
            checked_at: Some(Utc::now()),
        };
        self.cache.put(&id, entry)?;

        if !changed {
            return Ok(None);
        }

        let kind = if old_validator.is_none() {
            ChangeKind::New
        } else {
            ChangeKind::Modified
        };
        Ok(Some(ChangeReport {
            source_id: id,
            old_validator,
            new_validator,
            detected_at: Utc::now(),
            trigger: source.trigger,
            kind,
        }))
    }

    /// Check every registered source whose trigger is due now.
    ///
    /// Individual source failures never abort the pass; they are logged and
    /// the loop continues.
    pub async fn check_scheduled_sources(
        &self,
        layers: &[crate::types::Layer],
        vintage: u16,
    ) -> Vec<ChangeReport> {
        self.check_sources(layers, vintage, false).await
    }

    /// Check every registered source regardless of trigger.
    pub async fn check_all_sources(
        &self,
        layers: &[crate::types::Layer],
        vintage: u16,
    ) -> Vec<ChangeReport> {
        self.check_sources(layers, vintage, true).await
    }

    async fn check_sources(
        &self,
        layers: &[crate::types::Layer],
        vintage: u16,
        forced: bool,
    ) -> Vec<ChangeReport> {
        let now = Utc::now();
        let due: Vec<BoundarySource> = self
            .registry
            .sources_for_layers(layers, vintage)
            .into_iter()
            .filter(|s| s.trigger.is_due(now.year(), now.month(), forced))
            .collect();

        // Fan out across sources; per-source work stays sequential.
        let checks = due.iter().map(|source| self.check_for_change(source));
        let results = futures_util::future::join_all(checks).await;

        let mut reports = Vec::new();
        for (source, result) in due.iter().zip(results) {
            match result {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => {
                    warn!(source = %source.id(), error = %e, "change check failed");
                }
            }
        }
        reports
    }

    async fn probe_with_retry(
        &self,
        url: &str,
        prior: &ChecksumEntry,
    ) -> Result<ProbeResponse, AtlasError> {
        let mut attempt = 0u32;
        loop {
            match self.probe.probe(url, prior).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.kind().is_retryable() && attempt < PROBE_RETRIES => {
                    let delay = PROBE_BACKOFF_BASE_MS * 2u64.pow(attempt);
                    debug!(url, attempt, delay_ms = delay, "retrying validator probe");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
