use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::task::{PlaylistPosition, TaskId};

/// Status token carried by a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Downloading,
    Finished,
    Error,
}

/// One progress report from the engine. Consumed once by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: TaskId,
    pub percent: f64,
    pub speed: String,
    pub eta: String,
    pub status: EngineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_count: Option<u32>,
    /// Engine call this event belongs to. Set by the orchestrator when it
    /// forwards the event; unstamped events match any attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u64>,
}

impl ProgressEvent {
    pub fn new(id: TaskId, status: EngineStatus) -> Self {
        Self {
            id,
            percent: 0.0,
            speed: String::new(),
            eta: String::new(),
            status,
            title: None,
            playlist_index: None,
            playlist_count: None,
            attempt: None,
        }
    }

    pub fn downloading(id: TaskId, percent: f64) -> Self {
        Self {
            percent,
            ..Self::new(id, EngineStatus::Downloading)
        }
    }

    pub fn finished(id: TaskId) -> Self {
        Self {
            percent: 100.0,
            ..Self::new(id, EngineStatus::Finished)
        }
    }

    pub fn error(id: TaskId) -> Self {
        Self::new(id, EngineStatus::Error)
    }

    pub fn with_rate(mut self, speed: impl Into<String>, eta: impl Into<String>) -> Self {
        self.speed = speed.into();
        self.eta = eta.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_playlist(mut self, index: u32, count: u32) -> Self {
        self.playlist_index = Some(index);
        self.playlist_count = Some(count);
        self
    }

    pub fn with_attempt(mut self, attempt: u64) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Whether this event may be applied to `task`'s current engine call.
    pub fn matches_attempt(&self, current: u64) -> bool {
        match self.attempt {
            Some(attempt) => attempt == current,
            None => true,
        }
    }

    /// Both index and count present, with `1 <= index <= count`.
    pub fn playlist_position(&self) -> Option<PlaylistPosition> {
        match (self.playlist_index, self.playlist_count) {
            (Some(index), Some(total)) if index >= 1 && index <= total => {
                Some(PlaylistPosition { index, total })
            }
            _ => None,
        }
    }
}

pub type ProgressTx = mpsc::Sender<ProgressEvent>;
pub type ProgressRx = mpsc::Receiver<ProgressEvent>;

pub fn progress_channel(capacity: usize) -> (ProgressTx, ProgressRx) {
    mpsc::channel(capacity.max(1))
}
