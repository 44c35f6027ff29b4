//! Error types for the atlas kernel.
//!
//! Every failure surfaced by the kernel is one variant of [`AtlasError`].
//! Classification of raw lower-level failures (network strings, HTTP status
//! text) into retryable/terminal kinds is centralized in [`classify`] —
//! no other module is allowed to pattern-match on error messages.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Closed set of error kinds used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transient network failure (connection reset, timeout). Retryable.
    Network,
    /// Upstream rate limiting (429/503). Retryable.
    RateLimited,
    /// Resource does not exist upstream (404). Not retryable.
    NotFound,
    /// Cryptographic digest mismatch. Not retryable, escalated.
    Integrity,
    /// Unclassified failure. Treated as not retryable.
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited)
    }
}

/// Classify a raw error message into an [`ErrorKind`].
///
/// This is the single place the kernel inspects error text. Patterns are
/// checked in order: integrity, not-found, rate-limit, network.
pub fn classify(raw: &str) -> ErrorKind {
    static PATTERNS: OnceLock<[(Regex, ErrorKind); 4]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            (
                Regex::new(r"(?i)integrity|digest mismatch|checksum mismatch").unwrap(),
                ErrorKind::Integrity,
            ),
            (
                Regex::new(r"(?i)\b404\b|not found").unwrap(),
                ErrorKind::NotFound,
            ),
            (
                Regex::new(r"(?i)\b429\b|\b503\b|rate").unwrap(),
                ErrorKind::RateLimited,
            ),
            (
                Regex::new(r"(?i)ECONNRESET|ETIMEDOUT|fetch failed|connection|timed? ?out").unwrap(),
                ErrorKind::Network,
            ),
        ]
    });

    for (re, kind) in patterns.iter() {
        if re.is_match(raw) {
            return *kind;
        }
    }
    ErrorKind::Unknown
}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    /// Transient network failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream rate limiting.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream resource missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Downloaded bytes do not match the expected digest.
    #[error("Integrity failure for {url}: expected {expected}, got {actual}")]
    IntegrityFailure {
        /// Source URL whose bytes failed verification.
        url: String,
        /// Expected SHA-256 hex digest.
        expected: String,
        /// Observed SHA-256 hex digest.
        actual: String,
    },

    /// Input bytes could not be parsed as the expected format.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A halt gate tripped during validation.
    #[error("Validation halted: {gate}: {detail}")]
    ValidationHalted {
        /// Name of the gate that tripped.
        gate: &'static str,
        /// Human-readable finding.
        detail: String,
    },

    /// Two canonical boundaries share an id within one build.
    #[error("Duplicate boundary id: {0}")]
    DuplicateBoundaryId(String),

    /// Lookup input outside WGS84 bounds or non-finite.
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lon: f64,
    },

    /// Requested checkpoint does not exist.
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// The batch circuit breaker is open.
    #[error("Circuit open after {consecutive_failures} consecutive failures (checkpoint {checkpoint_id})")]
    CircuitOpen {
        /// Checkpoint recording the aborted batch.
        checkpoint_id: String,
        /// Failure count at the moment the breaker tripped.
        consecutive_failures: u32,
    },

    /// Every layer in the requested scope failed.
    #[error("All layers failed: {0}")]
    AllLayersFailed(String),

    /// A task observed the cancellation signal.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Filesystem failure in a persisted store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure in a persisted store.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AtlasError {
    /// Classify this error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::IntegrityFailure { .. } => ErrorKind::Integrity,
            _ => ErrorKind::Unknown,
        }
    }

    /// Build the appropriate variant from a raw lower-level message.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match classify(&raw) {
            ErrorKind::Network => Self::Network(raw),
            ErrorKind::RateLimited => Self::RateLimited(raw),
            ErrorKind::NotFound => Self::NotFound(raw),
            // Integrity errors are constructed explicitly with digests;
            // a bare classification falls through to Parse.
            ErrorKind::Integrity | ErrorKind::Unknown => Self::Parse(raw),
        }
    }
}

impl From<reqwest::Error> for AtlasError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            return Self::Network(e.to_string());
        }
        if let Some(status) = e.status() {
            if status.as_u16() == 404 {
                return Self::NotFound(e.to_string());
            }
            if status.as_u16() == 429 || status.as_u16() == 503 {
                return Self::RateLimited(e.to_string());
            }
        }
        Self::Network(e.to_string())
    }
}
