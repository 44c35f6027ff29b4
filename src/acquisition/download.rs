//! Download and integrity layer.
//!
//! Streams source bytes to disk, verifies them against a checksum manifest
//! when one is available, retries transient failures with exponential
//! backoff, and records terminal failures in the dead-letter queue.

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::AtlasError;
use crate::types::{BoundarySource, Layer};

use super::dlq::DeadLetterQueue;

/// Policy when the manifest has no digest for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestPolicy {
    /// Refuse to accept bytes without a known digest.
    Strict,
    /// Log and proceed without verification.
    Lenient,
}

/// Known-good digests keyed by (layer, state, vintage).
#[derive(Debug, Clone, Default)]
pub struct ChecksumManifest {
    digests: BTreeMap<(Layer, String, u16), String>,
}

impl ChecksumManifest {
    /// Empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an expected lowercase-hex SHA-256 digest.
    pub fn insert(&mut self, layer: Layer, state_fips: &str, vintage: u16, sha256: String) {
        self.digests
            .insert((layer, state_fips.to_string(), vintage), sha256);
    }

    /// Expected digest for a source, if known.
    pub fn expected(&self, layer: Layer, state_fips: &str, vintage: u16) -> Option<&str> {
        self.digests
            .get(&(layer, state_fips.to_string(), vintage))
            .map(String::as_str)
    }
}

/// Per-host minimum-delay gate.
///
/// Serializes request starts per endpoint so the kernel never hammers one
/// host, regardless of batch parallelism.
#[derive(Debug, Default)]
pub struct RateGate {
    last_start: Mutex<BTreeMap<String, tokio::time::Instant>>,
}

impl RateGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until at least `min_delay` has passed since the previous
    /// request to `host`, then claim the slot.
    pub async fn acquire(&self, host: &str, min_delay: Duration) {
        loop {
            let wait = {
                let mut last = self.last_start.lock();
                let now = tokio::time::Instant::now();
                match last.get(host) {
                    Some(prev) if now.duration_since(*prev) < min_delay => {
                        Some(min_delay - now.duration_since(*prev))
                    }
                    _ => {
                        last.insert(host.to_string(), now);
                        None
                    }
                }
            };
            match wait {
                Some(d) => tokio::time::sleep(d).await,
                None => return,
            }
        }
    }
}

/// Seam for transferring one URL's bytes to a file.
///
/// The production implementation streams over HTTP; tests script outcomes.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Transfer `url` to `out_path`, returning (byte count, sha256 hex).
    async fn fetch_to(&self, url: &str, out_path: &Path) -> Result<(u64, String), AtlasError>;
}

/// reqwest-backed byte source with streaming writes.
pub struct HttpByteSource {
    client: reqwest::Client,
}

impl HttpByteSource {
    /// Build a source with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, AtlasError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AtlasError::Configuration(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn fetch_to(&self, url: &str, out_path: &Path) -> Result<(u64, String), AtlasError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(AtlasError::NotFound(format!("HTTP 404 for {url}")));
        }
        if status.as_u16() == 429 || status.as_u16() == 503 {
            return Err(AtlasError::RateLimited(format!("HTTP {status} for {url}")));
        }
        if !status.is_success() {
            return Err(AtlasError::Network(format!("HTTP {status} for {url}")));
        }

        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = out_path.with_extension("part");
        let mut file = tokio::fs::File::create(&tmp).await?;
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AtlasError::from)?;
            hasher.update(&chunk);
            total += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, out_path).await?;

        Ok((total, hex::encode(hasher.finalize())))
    }
}

/// Downloader with integrity verification, retry, and DLQ recording.
pub struct Downloader<S: ByteSource> {
    source: S,
    manifest: ChecksumManifest,
    policy: ManifestPolicy,
    config: ExtractionConfig,
    gate: Arc<RateGate>,
    dlq: Option<Arc<DeadLetterQueue>>,
}

impl<S: ByteSource> Downloader<S> {
    /// Create a downloader.
    pub fn new(
        source: S,
        manifest: ChecksumManifest,
        policy: ManifestPolicy,
        config: ExtractionConfig,
        dlq: Option<Arc<DeadLetterQueue>>,
    ) -> Self {
        Self {
            source,
            manifest,
            policy,
            config,
            gate: Arc::new(RateGate::new()),
            dlq,
        }
    }

    /// Download one source to `out_path` and verify integrity.
    ///
    /// A digest mismatch is an [`AtlasError::IntegrityFailure`] and is never
    /// retried by [`Self::download_with_retry`].
    pub async fn download(
        &self,
        source: &BoundarySource,
        out_path: &Path,
    ) -> Result<DownloadedFile, AtlasError> {
        let host = host_of(&source.url);
        self.gate
            .acquire(
                &host,
                Duration::from_millis(self.config.per_host_min_delay_ms),
            )
            .await;

        let (bytes, actual_sha256) = self.source.fetch_to(&source.url, out_path).await?;

        match self
            .manifest
            .expected(source.layer, &source.state_fips, source.vintage)
        {
            Some(expected) if expected != actual_sha256 => {
                return Err(AtlasError::IntegrityFailure {
                    url: source.url.clone(),
                    expected: expected.to_string(),
                    actual: actual_sha256,
                });
            }
            Some(_) => {
                debug!(source = %source.id(), "digest verified");
            }
            None => match self.policy {
                ManifestPolicy::Strict => {
                    return Err(AtlasError::Configuration(format!(
                        "no manifest digest for {} under strict policy",
                        source.id()
                    )));
                }
                ManifestPolicy::Lenient => {
                    warn!(source = %source.id(), "no manifest digest; proceeding unverified");
                }
            },
        }

        Ok(DownloadedFile {
            path: out_path.to_path_buf(),
            bytes,
            sha256: actual_sha256,
        })
    }

    /// Download with up to `retry_attempts` retries and exponential backoff.
    ///
    /// On terminal failure, the task is recorded in the DLQ (when one is
    /// configured) under its idempotency key.
    pub async fn download_with_retry(
        &self,
        source: &BoundarySource,
        out_path: &Path,
        job_id: &str,
    ) -> Result<DownloadedFile, AtlasError> {
        let mut attempt = 0u32;
        let result = loop {
            match self.download(source, out_path).await {
                Ok(file) => {
                    info!(source = %source.id(), bytes = file.bytes, "download complete");
                    break Ok(file);
                }
                Err(e) if e.kind().is_retryable() && attempt < self.config.retry_attempts => {
                    let delay = self.config.retry_delay_ms * 2u64.pow(attempt);
                    debug!(source = %source.id(), attempt, delay_ms = delay, error = %e, "retrying download");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = &result {
            if let Some(dlq) = &self.dlq {
                if let Err(dlq_err) = dlq.record_failure(source, job_id, &e.to_string()) {
                    warn!(source = %source.id(), error = %dlq_err, "failed to record DLQ row");
                }
            }
        }
        result
    }
}

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Where the bytes landed.
    pub path: PathBuf,
    /// Byte count.
    pub bytes: u64,
    /// SHA-256 of the bytes, lowercase hex.
    pub sha256: String,
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::sha256_hex;
    use crate::registry::SourceRegistry;

    /// Byte source that replays scripted outcomes and counts calls.
    struct ScriptedSource {
        script: Mutex<Vec<Result<Vec<u8>, AtlasError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<u8>, AtlasError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }
        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl ByteSource for ScriptedSource {
        async fn fetch_to(&self, _url: &str, out: &Path) -> Result<(u64, String), AtlasError> {
            *self.calls.lock() += 1;
            let mut script = self.script.lock();
            if script.is_empty() {
                return Err(AtlasError::Network("script exhausted".into()));
            }
            match script.remove(0) {
                Ok(bytes) => {
                    std::fs::write(out, &bytes)?;
                    Ok((bytes.len() as u64, sha256_hex(&bytes)))
                }
                Err(e) => Err(e),
            }
        }
    }

    fn wyoming_cd() -> BoundarySource {
        SourceRegistry::new()
            .source(Layer::CongressionalDistrict, "56", 2024)
            .unwrap()
    }

    fn downloader(
        script: Vec<Result<Vec<u8>, AtlasError>>,
        manifest: ChecksumManifest,
        policy: ManifestPolicy,
        dlq: Option<Arc<DeadLetterQueue>>,
    ) -> Downloader<ScriptedSource> {
        let config = ExtractionConfig {
            retry_attempts: 3,
            retry_delay_ms: 10,
            per_host_min_delay_ms: 0,
            ..Default::default()
        };
        Downloader::new(ScriptedSource::new(script), manifest, policy, config, dlq)
    }

    #[tokio::test]
    async fn test_integrity_verified_success() {
        let bytes = b"boundary bytes".to_vec();
        let mut manifest = ChecksumManifest::new();
        manifest.insert(
            Layer::CongressionalDistrict,
            "56",
            2024,
            sha256_hex(&bytes),
        );
        let dl = downloader(vec![Ok(bytes)], manifest, ManifestPolicy::Strict, None);
        let dir = tempfile::tempdir().unwrap();
        let file = dl
            .download(&wyoming_cd(), &dir.path().join("cd.zip"))
            .await
            .unwrap();
        assert_eq!(file.bytes, 14);
    }

    #[tokio::test]
    async fn test_integrity_mismatch_is_terminal() {
        let mut manifest = ChecksumManifest::new();
        manifest.insert(
            Layer::CongressionalDistrict,
            "56",
            2024,
            "0".repeat(64),
        );
        let dl = downloader(
            vec![Ok(b"tampered".to_vec()), Ok(b"tampered".to_vec())],
            manifest,
            ManifestPolicy::Strict,
            None,
        );
        let dir = tempfile::tempdir().unwrap();
        let err = dl
            .download_with_retry(&wyoming_cd(), &dir.path().join("cd.zip"), "job")
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::IntegrityFailure { .. }));
        // Never retried.
        assert_eq!(dl.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_strict_policy_refuses_unknown_digest() {
        let dl = downloader(
            vec![Ok(b"x".to_vec())],
            ChecksumManifest::new(),
            ManifestPolicy::Strict,
            None,
        );
        let dir = tempfile::tempdir().unwrap();
        let err = dl
            .download(&wyoming_cd(), &dir.path().join("cd.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_lenient_policy_proceeds_unverified() {
        let dl = downloader(
            vec![Ok(b"x".to_vec())],
            ChecksumManifest::new(),
            ManifestPolicy::Lenient,
            None,
        );
        let dir = tempfile::tempdir().unwrap();
        assert!(dl
            .download(&wyoming_cd(), &dir.path().join("cd.zip"))
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retry_then_succeed() {
        let dl = downloader(
            vec![
                Err(AtlasError::Network("ECONNRESET".into())),
                Err(AtlasError::RateLimited("429".into())),
                Ok(b"finally".to_vec()),
            ],
            ChecksumManifest::new(),
            ManifestPolicy::Lenient,
            None,
        );
        let dir = tempfile::tempdir().unwrap();
        let file = dl
            .download_with_retry(&wyoming_cd(), &dir.path().join("cd.zip"), "job")
            .await
            .unwrap();
        assert_eq!(file.bytes, 7);
        assert_eq!(dl.source.calls(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried_and_hits_dlq() {
        let dlq = Arc::new(DeadLetterQueue::ephemeral(3, 1_000, 2.0));
        let dl = downloader(
            vec![Err(AtlasError::NotFound("HTTP 404".into()))],
            ChecksumManifest::new(),
            ManifestPolicy::Lenient,
            Some(dlq.clone()),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = dl
            .download_with_retry(&wyoming_cd(), &dir.path().join("cd.zip"), "job")
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::NotFound(_)));
        assert_eq!(dl.source.calls(), 1);
        assert_eq!(dlq.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_gate_spaces_same_host_requests() {
        let gate = RateGate::new();
        let start = tokio::time::Instant::now();
        gate.acquire("host", Duration::from_millis(100)).await;
        gate.acquire("host", Duration::from_millis(100)).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
