//! Queue events broadcast to observers (renderers, loggers).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::orchestrator::{RunPhase, RunSummary};
use crate::progress::PlaylistContext;
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    TaskAdded {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TasksRemoved {
        ids: Vec<TaskId>,
    },
    RunStarted {
        run_id: String,
        total: usize,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        summary: RunSummary,
    },
    PhaseChanged {
        phase: RunPhase,
    },
    PlaylistContextChanged {
        context: Option<PlaylistContext>,
    },
}

impl QueueEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskAdded { .. } => "task_added",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TasksRemoved { .. } => "tasks_removed",
            Self::RunStarted { .. } => "run_started",
            Self::RunFinished { .. } => "run_finished",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::PlaylistContextChanged { .. } => "playlist_context_changed",
        }
    }
}
