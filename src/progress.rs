//! Build progress events.
//!
//! Progress crosses a bounded channel to an optional sink. Sends are
//! non-blocking: when the sink lags, events are dropped rather than ever
//! stalling the build.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Pipeline stage an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// Source fetch started or finished.
    Fetch,
    /// Post-download validation.
    Validate,
    /// Normalization into canonical records.
    Normalize,
    /// Cross-validation against the registry.
    CrossValidate,
    /// Merkle commitment.
    Commit,
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Pipeline stage.
    pub stage: ProgressStage,
    /// State FIPS code, when stage is state-scoped.
    pub state_fips: Option<String>,
    /// Layer wire code, when stage is layer-scoped.
    pub layer: Option<String>,
    /// Records processed at this point.
    pub count: u64,
}

/// Cloneable, droppable progress sender.
///
/// `None` inside means no sink is attached and sends are no-ops.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender with no sink attached.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a bounded channel and the sender feeding it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// Emit an event without blocking. Full or closed channels drop it.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }

    /// Convenience constructor + emit.
    pub fn emit_stage(
        &self,
        stage: ProgressStage,
        state_fips: Option<&str>,
        layer: Option<&str>,
        count: u64,
    ) {
        self.emit(ProgressEvent {
            stage,
            state_fips: state_fips.map(str::to_string),
            layer: layer.map(str::to_string),
            count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_flow_through_channel() {
        let (sender, mut rx) = ProgressSender::channel(8);
        sender.emit_stage(ProgressStage::Fetch, Some("55"), Some("cd"), 0);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.stage, ProgressStage::Fetch);
        assert_eq!(event.state_fips.as_deref(), Some("55"));
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (sender, _rx) = ProgressSender::channel(1);
        sender.emit_stage(ProgressStage::Fetch, None, None, 1);
        // Second emit would block a blocking sender; it must return instantly.
        sender.emit_stage(ProgressStage::Fetch, None, None, 2);
    }

    #[test]
    fn test_disabled_sender_is_noop() {
        ProgressSender::disabled().emit_stage(ProgressStage::Commit, None, None, 0);
    }
}
