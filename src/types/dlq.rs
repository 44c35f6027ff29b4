//! Dead-letter queue rows.
//!
//! One row per (source, job). Repeat terminal failures of the same source
//! increment `attempt_count` on the same row; the row flips to `Exhausted`
//! when attempts reach the maximum.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::sha256_hex;

/// Lifecycle status of a failed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Recorded, not yet retried.
    Pending,
    /// At least one retry has been scheduled.
    Retrying,
    /// Attempt budget spent; needs manual intervention.
    Exhausted,
    /// A later attempt succeeded.
    Resolved,
}

/// One dead-letter row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDownload {
    /// Idempotency key: sha256(url || layer || state || year).
    pub id_hash: String,
    /// Batch job that recorded the failure.
    pub job_id: String,
    /// Source URL.
    pub url: String,
    /// Layer wire code.
    pub layer: String,
    /// Two-digit state FIPS.
    pub state_fips: String,
    /// Vintage year.
    pub year: u16,
    /// Number of terminal failures recorded for this row.
    pub attempt_count: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Current status.
    pub status: DownloadStatus,
    /// Most recent error message.
    pub last_error: String,
    /// Earliest time the next retry may run.
    pub next_retry_at: DateTime<Utc>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was resolved, if ever.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl FailedDownload {
    /// Compute the idempotency key for a source.
    pub fn id_hash_for(url: &str, layer: &str, state_fips: &str, year: u16) -> String {
        let material = format!("{url}{layer}{state_fips}{year}");
        sha256_hex(material.as_bytes())
    }

    /// Backoff delay before attempt `n`: `base · multiplier^n`.
    pub fn backoff_delay(base_ms: u64, multiplier: f64, attempts: u32) -> Duration {
        let ms = (base_ms as f64) * multiplier.powi(attempts as i32);
        // Clamp to a day so arithmetic stays in range.
        Duration::milliseconds(ms.min(86_400_000.0) as i64)
    }

    /// Whether the attempt budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_hash_is_stable() {
        let a = FailedDownload::id_hash_for("https://x/f.zip", "cd", "56", 2024);
        let b = FailedDownload::id_hash_for("https://x/f.zip", "cd", "56", 2024);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_id_hash_differs_by_component() {
        let a = FailedDownload::id_hash_for("https://x/f.zip", "cd", "56", 2024);
        let b = FailedDownload::id_hash_for("https://x/f.zip", "cd", "55", 2024);
        assert_ne!(a, b);
    }

    #[test]
    fn test_backoff_growth() {
        let d0 = FailedDownload::backoff_delay(1000, 2.0, 0);
        let d3 = FailedDownload::backoff_delay(1000, 2.0, 3);
        assert_eq!(d0.num_milliseconds(), 1000);
        assert_eq!(d3.num_milliseconds(), 8000);
    }

    #[test]
    fn test_backoff_clamped() {
        let d = FailedDownload::backoff_delay(1000, 2.0, 64);
        assert_eq!(d.num_milliseconds(), 86_400_000);
    }
}
