//! Change detection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::layer::UpdateTrigger;
use super::source::SourceId;

/// Kind of detected upstream change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// No prior validator existed for this source.
    New,
    /// The validator differs from the persisted one.
    Modified,
}

/// Last observed HTTP validators for one source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecksumEntry {
    /// Strong ETag, when the upstream provided one.
    pub etag: Option<String>,
    /// Last-Modified value, used as fallback validator.
    pub last_modified: Option<String>,
    /// When this source was last checked.
    pub checked_at: Option<DateTime<Utc>>,
}

impl ChecksumEntry {
    /// The effective validator: strong ETag preferred, Last-Modified fallback.
    pub fn validator(&self) -> Option<&str> {
        self.etag.as_deref().or(self.last_modified.as_deref())
    }
}

/// Report emitted when a source's validator changed upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    /// Source that changed.
    pub source_id: SourceId,
    /// Previously persisted validator, if any.
    pub old_validator: Option<String>,
    /// Newly observed validator.
    pub new_validator: String,
    /// When the change was detected.
    pub detected_at: DateTime<Utc>,
    /// Trigger that caused this check.
    pub trigger: UpdateTrigger,
    /// New vs modified.
    pub kind: ChangeKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_prefers_etag() {
        let entry = ChecksumEntry {
            etag: Some("\"A\"".to_string()),
            last_modified: Some("B".to_string()),
            checked_at: None,
        };
        assert_eq!(entry.validator(), Some("\"A\""));
    }

    #[test]
    fn test_validator_falls_back_to_last_modified() {
        let entry = ChecksumEntry {
            etag: None,
            last_modified: Some("Wed, 01 May 2024 00:00:00 GMT".to_string()),
            checked_at: None,
        };
        assert_eq!(entry.validator(), Some("Wed, 01 May 2024 00:00:00 GMT"));
    }

    #[test]
    fn test_validator_absent() {
        assert_eq!(ChecksumEntry::default().validator(), None);
    }
}
