use tokio::task::JoinHandle;

use crate::events::QueueEvent;
use crate::task::{PlaylistPosition, Task, TaskPatch, TaskStatus, TaskStore};

use super::event::{EngineStatus, ProgressEvent, ProgressRx};
use super::playlist::{PlaylistContext, PlaylistContextCell};

/// Overall percent of a playlist-bearing task: items before `position.index`
/// count as done, the current item contributes `item_percent`.
pub fn aggregate_percent(item_percent: f64, position: Option<PlaylistPosition>) -> f64 {
    let item = item_percent.clamp(0.0, 100.0);
    match position {
        Some(PlaylistPosition { index, total }) if total > 0 && index >= 1 && index <= total => {
            ((index - 1) as f64 + item / 100.0) / total as f64 * 100.0
        }
        _ => item,
    }
}

/// Sole consumer of the progress channel.
///
/// Events are applied in arrival order. Only tasks that are `downloading`
/// accept events: unknown ids, stale events for `pending` tasks and late
/// events for terminal tasks are dropped.
#[derive(Clone)]
pub struct Reconciler {
    store: TaskStore,
    playlist: PlaylistContextCell,
}

impl Reconciler {
    pub fn new(store: TaskStore, playlist: PlaylistContextCell) -> Self {
        Self { store, playlist }
    }

    /// Drain `rx` until every sender is gone.
    pub fn spawn(self, mut rx: ProgressRx) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.on_event(event).await;
            }
            tracing::debug!("progress channel closed, reconciler exiting");
        })
    }

    /// Apply one event. Returns whether the store changed.
    pub async fn on_event(&self, event: ProgressEvent) -> bool {
        let position = event.playlist_position();
        let updated = self
            .store
            .patch_with(&event.id, |task| {
                (task.status == TaskStatus::Downloading && event.matches_attempt(task.attempt))
                    .then(|| patch_for(task, &event, position))
            })
            .await;

        let Some(task) = updated else {
            tracing::trace!(task_id = %event.id, status = ?event.status, "dropping progress event");
            return false;
        };

        match event.status {
            EngineStatus::Downloading => {
                if let Some(pos) = position {
                    let ctx = PlaylistContext {
                        task_id: task.id.clone(),
                        title: task.title.clone(),
                        index: pos.index,
                        total: pos.total,
                    };
                    if self.playlist.set(ctx.clone()).await {
                        self.store.emit(QueueEvent::PlaylistContextChanged { context: Some(ctx) });
                    }
                }
            }
            EngineStatus::Finished => {
                if self.playlist.clear_if_owner(&task.id).await {
                    self.store
                        .emit(QueueEvent::PlaylistContextChanged { context: None });
                }
            }
            EngineStatus::Error => {}
        }
        true
    }
}

fn learned_title<'a>(task: &Task, event: &'a ProgressEvent) -> Option<&'a str> {
    event
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != task.url)
}

fn patch_for(task: &Task, event: &ProgressEvent, position: Option<PlaylistPosition>) -> TaskPatch {
    let mut patch = match event.status {
        EngineStatus::Downloading => {
            let percent = aggregate_percent(event.percent, position).max(task.progress);
            let mut p = TaskPatch::default()
                .progress(percent)
                .speed(event.speed.clone())
                .eta(event.eta.clone());
            if let Some(pos) = position {
                p = p.playlist(pos);
            }
            p
        }
        EngineStatus::Finished => TaskPatch::default()
            .status(TaskStatus::Completed)
            .progress(100.0)
            .speed("")
            .eta("")
            .clear_playlist(),
        // The message comes from the engine call's result, not the stream.
        EngineStatus::Error => TaskPatch::default().status(TaskStatus::Error),
    };
    if let Some(title) = learned_title(task, event) {
        patch = patch.title(title);
    }
    patch
}
