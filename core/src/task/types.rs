use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::SourcePlatform;

/// Opaque task identity, generated at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Downloading,
    Completed,
    Error,
    /// Stopped by the user while in flight.
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position inside a playlist being expanded by the engine (1-based index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistPosition {
    pub index: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub url: String,
    /// Starts as the URL; replaced once the engine reports a real title.
    pub title: String,
    pub status: TaskStatus,
    /// 0..=100
    pub progress: f64,
    pub speed: String,
    pub eta: String,
    pub error: Option<String>,
    pub is_playlist: bool,
    pub playlist: Option<PlaylistPosition>,
    pub platform: SourcePlatform,
    pub added_at: DateTime<Utc>,
    /// Engine call counter. Bumped each time the task is handed to the
    /// engine; progress stamped with an older attempt is ignored.
    #[serde(default)]
    pub attempt: u64,
}

impl Task {
    pub fn new(url: impl Into<String>, is_playlist: bool, platform: SourcePlatform) -> Self {
        let url = url.into();
        Self {
            id: TaskId::new(),
            title: url.clone(),
            url,
            status: TaskStatus::Pending,
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            error: None,
            is_playlist,
            playlist: None,
            platform,
            added_at: Utc::now(),
            attempt: 0,
        }
    }

    pub fn has_real_title(&self) -> bool {
        self.title != self.url
    }

    /// Back to a clean `pending` state. The learned title is kept.
    pub(crate) fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.progress = 0.0;
        self.speed.clear();
        self.eta.clear();
        self.error = None;
        self.playlist = None;
    }
}

/// Partial update merged atomically into a task by `TaskStore::patch`.
///
/// After the merge the task invariants are re-established: the error
/// message only survives in `error`, playlist position only survives in
/// `downloading`, and `completed` pins progress to 100.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub title: Option<String>,
    pub progress: Option<f64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub error: Option<String>,
    pub playlist: Option<Option<PlaylistPosition>>,
}

impl TaskPatch {
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn speed(mut self, speed: impl Into<String>) -> Self {
        self.speed = Some(speed.into());
        self
    }

    pub fn eta(mut self, eta: impl Into<String>) -> Self {
        self.eta = Some(eta.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn playlist(mut self, position: PlaylistPosition) -> Self {
        self.playlist = Some(Some(position));
        self
    }

    pub fn clear_playlist(mut self) -> Self {
        self.playlist = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(progress) = self.progress {
            task.progress = progress.clamp(0.0, 100.0);
        }
        if let Some(speed) = self.speed {
            task.speed = speed;
        }
        if let Some(eta) = self.eta {
            task.eta = eta;
        }
        if let Some(error) = self.error {
            task.error = Some(error);
        }
        if let Some(playlist) = self.playlist {
            task.playlist = playlist;
        }

        if task.status != TaskStatus::Downloading {
            task.playlist = None;
        }
        if task.status != TaskStatus::Error {
            task.error = None;
        }
        if task.status == TaskStatus::Completed {
            task.progress = 100.0;
        }
    }
}
