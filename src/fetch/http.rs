//! HTTP fetcher: download layer + GeoJSON parse.
//!
//! Downloads a source to a spool directory through the integrity-checked
//! download layer, then parses the file as GeoJSON. Upstream sources that
//! publish shapefile archives are converted to GeoJSON by an external tool
//! before they reach this fetcher; the kernel's contract starts at parsed
//! features.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;

use crate::acquisition::download::{ByteSource, Downloader, HttpByteSource};
use crate::acquisition::{AcquisitionStores, CancelFlag, ChecksumManifest, ManifestPolicy};
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::types::BoundarySource;

use super::{parse_feature_collection, BoundaryFetcher, FetchedLayer};

/// Download-then-parse fetcher.
pub struct HttpFetcher<S: ByteSource> {
    downloader: Downloader<S>,
    spool_dir: PathBuf,
    job_id: String,
}

impl HttpFetcher<HttpByteSource> {
    /// Production fetcher: HTTP byte source, extraction settings, and the
    /// dead-letter queue opened from the persistence configuration.
    pub fn from_config(
        config: &AtlasConfig,
        manifest: ChecksumManifest,
        policy: ManifestPolicy,
        spool_dir: impl Into<PathBuf>,
    ) -> Result<Self, AtlasError> {
        let stores = AcquisitionStores::open(config)?;
        let source = HttpByteSource::new(Duration::from_millis(config.extraction.timeout_ms))?;
        let downloader = Downloader::new(
            source,
            manifest,
            policy,
            config.extraction.clone(),
            Some(stores.dlq),
        );
        let job_id = format!("job_{}", uuid::Uuid::new_v4().simple());
        Ok(Self::new(downloader, spool_dir, job_id))
    }
}

impl<S: ByteSource> HttpFetcher<S> {
    /// Create a fetcher spooling downloads under `spool_dir`.
    pub fn new(downloader: Downloader<S>, spool_dir: impl Into<PathBuf>, job_id: String) -> Self {
        Self {
            downloader,
            spool_dir: spool_dir.into(),
            job_id,
        }
    }

    fn spool_path(&self, source: &BoundarySource) -> PathBuf {
        self.spool_dir.join(format!(
            "{}_{}_{}.geojson",
            source.layer.code(),
            source.state_fips,
            source.vintage
        ))
    }
}

#[async_trait]
impl<S: ByteSource> BoundaryFetcher for HttpFetcher<S> {
    async fn fetch(
        &self,
        source: &BoundarySource,
        cancel: &CancelFlag,
    ) -> Result<FetchedLayer, AtlasError> {
        if cancel.is_cancelled() {
            return Err(cancel.as_error(&source.state_fips));
        }
        let out_path = self.spool_path(source);
        let downloaded = self
            .downloader
            .download_with_retry(source, &out_path, &self.job_id)
            .await?;

        if cancel.is_cancelled() {
            return Err(cancel.as_error(&source.state_fips));
        }
        let raw = tokio::fs::read_to_string(&downloaded.path).await?;
        let features = parse_feature_collection(&raw)?;

        Ok(FetchedLayer {
            source: source.clone(),
            features,
            content_sha256: downloaded.sha256,
            retrieved_at: Utc::now(),
        })
    }
}
