use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::QueueSettings;
use crate::error::QueueError;

/// Global run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    /// Stop requested, loop unwinding.
    Stopping,
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Optional per-task bound on the engine call. `None` waits forever.
    pub engine_timeout: Option<Duration>,
    pub progress_channel_capacity: usize,
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            engine_timeout: None,
            progress_channel_capacity: 256,
            event_channel_capacity: 1024,
        }
    }
}

/// Per-run state owned by the run loop.
pub(crate) struct RunContext {
    pub run_id: String,
    pub cancel: CancellationToken,
    pub settings: QueueSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Tasks in the run's work set that still exist at loop exit.
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub pending: usize,
    /// Loop ended because of `stop`.
    pub stopped: bool,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        !self.stopped && self.failed == 0 && self.cancelled == 0 && self.pending == 0
    }
}

/// Returned by `start`; await it to get the run's summary.
#[derive(Debug)]
pub struct RunHandle {
    pub(crate) run_id: String,
    pub(crate) join: JoinHandle<RunSummary>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<RunSummary, QueueError> {
        self.join
            .await
            .map_err(|e| QueueError::RunAborted(e.to_string()))
    }
}
