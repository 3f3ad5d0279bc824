use std::time::Duration;

use thiserror::Error;

/// Failure outcome of a single `EngineAdapter::download` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    /// Network or extraction failure reported by the engine.
    #[error("{0}")]
    Network(String),
    #[error("unsupported URL: {0}")]
    Unsupported(String),
    /// Disk or permission failure while writing output.
    #[error("disk error: {0}")]
    Disk(String),
    #[error("download cancelled")]
    Cancelled,
    #[error("timed out after {}", format_limit(.0))]
    TimedOut(Duration),
    #[error("engine failed to start: {0}")]
    Spawn(String),
}

/// Whole seconds print as `30s`, anything finer as `1500ms`.
fn format_limit(limit: &Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}

impl EngineFailure {
    /// Message recorded on the task when it ends in `error`.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Unsupported(_) => "unsupported",
            Self::Disk(_) => "disk",
            Self::Cancelled => "cancelled",
            Self::TimedOut(_) => "timeout",
            Self::Spawn(_) => "spawn",
        }
    }
}
