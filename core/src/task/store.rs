//! In-memory task store shared by the orchestrator, the progress reconciler
//! and any observer.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::error::QueueError;
use crate::events::QueueEvent;

use super::source::{is_playlist_url, validate_url, SourcePlatform};
use super::transitions::StatusTransition;
use super::types::{Task, TaskId, TaskPatch, TaskStatus};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Ordered task collection. All mutations go through one write lock, so the
/// run loop and the reconciler never interleave partial updates.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    event_tx: broadcast::Sender<QueueEvent>,
}

#[derive(Default)]
struct StoreState {
    tasks: Vec<Task>,
    /// Task currently handed to the engine, if any.
    in_flight: Option<TaskId>,
    run_active: bool,
}

impl StoreState {
    fn find_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub downloading: usize,
    pub completed: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                event_tx,
            }),
        }
    }

    /// Subscribe to queue events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: QueueEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Append valid, not-yet-queued URLs in input order and return their ids.
    ///
    /// Invalid URLs and exact duplicates (of queued tasks or of earlier
    /// entries in the same batch) are dropped silently.
    pub async fn add<I, S>(&self, urls: I) -> Vec<TaskId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = {
            let mut state = self.inner.state.write().await;
            let mut seen: HashSet<String> = state.tasks.iter().map(|t| t.url.clone()).collect();
            let mut added = Vec::new();

            for raw in urls {
                let Some((url, parsed)) = validate_url(raw.as_ref()) else {
                    tracing::debug!(url = raw.as_ref(), "dropping invalid url");
                    continue;
                };
                if !seen.insert(url.clone()) {
                    tracing::debug!(url = %url, "dropping duplicate url");
                    continue;
                }
                let task = Task::new(url, is_playlist_url(&parsed), SourcePlatform::from_url(&parsed));
                state.tasks.push(task.clone());
                added.push(task);
            }
            added
        };

        let ids = added.iter().map(|t| t.id.clone()).collect();
        for task in added {
            tracing::info!(task_id = %task.id, url = %task.url, playlist = task.is_playlist, "task queued");
            self.emit(QueueEvent::TaskAdded { task });
        }
        ids
    }

    /// Remove one task. Returns `Ok(false)` when the id is unknown and
    /// `TaskBusy` when the task is the one currently being downloaded.
    pub async fn remove(&self, id: &TaskId) -> Result<bool, QueueError> {
        {
            let mut state = self.inner.state.write().await;
            if state.in_flight.as_ref() == Some(id) {
                return Err(QueueError::TaskBusy(id.clone()));
            }
            let before = state.tasks.len();
            state.tasks.retain(|t| &t.id != id);
            if state.tasks.len() == before {
                return Ok(false);
            }
        }
        self.emit(QueueEvent::TasksRemoved {
            ids: vec![id.clone()],
        });
        Ok(true)
    }

    /// Remove every task. Rejected while a run is active.
    pub async fn clear(&self) -> Result<usize, QueueError> {
        let ids: Vec<TaskId> = {
            let mut state = self.inner.state.write().await;
            if state.run_active {
                return Err(QueueError::RunActive);
            }
            state.tasks.drain(..).map(|t| t.id).collect()
        };
        let n = ids.len();
        if n > 0 {
            self.emit(QueueEvent::TasksRemoved { ids });
        }
        Ok(n)
    }

    /// Remove only `completed` tasks.
    pub async fn clear_completed(&self) -> usize {
        let ids: Vec<TaskId> = {
            let mut state = self.inner.state.write().await;
            let (done, keep): (Vec<Task>, Vec<Task>) = state
                .tasks
                .drain(..)
                .partition(|t| t.status == TaskStatus::Completed);
            state.tasks = keep;
            done.into_iter().map(|t| t.id).collect()
        };
        let n = ids.len();
        if n > 0 {
            self.emit(QueueEvent::TasksRemoved { ids });
        }
        n
    }

    /// Ordered copy of all tasks.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.inner.state.read().await.tasks.clone()
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        let state = self.inner.state.read().await;
        state.tasks.iter().find(|t| &t.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.tasks.is_empty()
    }

    pub async fn in_flight(&self) -> Option<TaskId> {
        self.inner.state.read().await.in_flight.clone()
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.read().await;
        let mut stats = QueueStats {
            total: state.tasks.len(),
            ..Default::default()
        };
        for task in &state.tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Downloading => stats.downloading += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Error => stats.error += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Merge `patch` into the task. No-op when the id is absent or the patch
    /// would make an invalid status transition.
    pub async fn patch(&self, id: &TaskId, patch: TaskPatch) -> Option<Task> {
        self.patch_with(id, move |_| Some(patch)).await
    }

    /// Build the patch from the current task under the write lock, so the
    /// check and the update are atomic. Returning `None` leaves the task
    /// untouched.
    pub async fn patch_with<F>(&self, id: &TaskId, f: F) -> Option<Task>
    where
        F: FnOnce(&Task) -> Option<TaskPatch>,
    {
        let updated = {
            let mut state = self.inner.state.write().await;
            let task = state.find_mut(id)?;
            let patch = f(task)?;
            if let Some(to) = patch.status {
                if let Err(e) = StatusTransition::validate(task.status, to) {
                    tracing::warn!(task_id = %id, error = %e, "rejected task patch");
                    return None;
                }
            }
            patch.apply(task);
            task.clone()
        };
        self.emit(QueueEvent::TaskUpdated {
            task: updated.clone(),
        });
        Some(updated)
    }

    /// Lock the store for a run: reset every task to `pending` and return the
    /// ids in order. This list is the run's fixed work set.
    pub(crate) async fn begin_run(&self) -> Result<Vec<TaskId>, QueueError> {
        let reset = {
            let mut state = self.inner.state.write().await;
            if state.run_active {
                return Err(QueueError::AlreadyRunning);
            }
            if state.tasks.is_empty() {
                return Err(QueueError::EmptyQueue);
            }
            state.run_active = true;
            state.in_flight = None;
            for task in state.tasks.iter_mut() {
                task.reset();
            }
            state.tasks.clone()
        };

        let ids = reset.iter().map(|t| t.id.clone()).collect();
        for task in reset {
            self.emit(QueueEvent::TaskUpdated { task });
        }
        Ok(ids)
    }

    /// Mark a task `downloading` and record it as in flight. `None` when the
    /// task was removed after the run started.
    pub(crate) async fn begin_task(&self, id: &TaskId) -> Option<Task> {
        let task = {
            let mut state = self.inner.state.write().await;
            let task = state.find_mut(id)?;
            TaskPatch::default()
                .status(TaskStatus::Downloading)
                .progress(0.0)
                .speed("")
                .eta("")
                .apply(task);
            task.attempt += 1;
            let task = task.clone();
            state.in_flight = Some(id.clone());
            task
        };
        self.emit(QueueEvent::TaskUpdated { task: task.clone() });
        Some(task)
    }

    /// Record the engine call's outcome. The call result is authoritative, so
    /// it may overwrite a terminal status the progress stream set first.
    pub(crate) async fn settle_task(&self, id: &TaskId, patch: TaskPatch) -> Option<Task> {
        let task = {
            let mut state = self.inner.state.write().await;
            if state.in_flight.as_ref() == Some(id) {
                state.in_flight = None;
            }
            let task = state.find_mut(id)?;
            if !(task.status == TaskStatus::Downloading || task.status.is_terminal()) {
                tracing::warn!(task_id = %id, status = %task.status, "settle on a task that is not in flight");
                return None;
            }
            patch.apply(task);
            task.clone()
        };
        self.emit(QueueEvent::TaskUpdated { task: task.clone() });
        Some(task)
    }

    pub(crate) async fn end_run(&self) {
        let mut state = self.inner.state.write().await;
        state.run_active = false;
        state.in_flight = None;
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn urls(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.url.as_str()).collect()
    }

    #[tokio::test]
    async fn add_keeps_order_and_drops_duplicates() {
        let store = TaskStore::new();
        let ids = store
            .add([
                "https://a.example/1",
                "https://b.example/2",
                "https://a.example/1",
                "https://c.example/3",
            ])
            .await;
        assert_eq!(ids.len(), 3);

        let more = store.add(["https://b.example/2", "https://d.example/4"]).await;
        assert_eq!(more.len(), 1);

        let snap = store.snapshot().await;
        assert_eq!(
            urls(&snap),
            vec![
                "https://a.example/1",
                "https://b.example/2",
                "https://c.example/3",
                "https://d.example/4"
            ]
        );
    }

    #[tokio::test]
    async fn add_drops_invalid_urls() {
        let store = TaskStore::new();
        let ids = store
            .add(["https://youtu.be/abc", "definitely not a url", "", "ftp://x.example/"])
            .await;
        assert_eq!(ids.len(), 1);
        let task = store.get(&ids[0]).await.unwrap();
        assert_eq!(task.url, "https://youtu.be/abc");
        assert_eq!(task.platform, SourcePlatform::Youtube);
        assert!(!task.is_playlist);
    }

    #[tokio::test]
    async fn add_flags_playlists() {
        let store = TaskStore::new();
        let ids = store
            .add(["https://www.youtube.com/playlist?list=PL1"])
            .await;
        assert!(store.get(&ids[0]).await.unwrap().is_playlist);
    }

    #[tokio::test]
    async fn remove_rejects_in_flight_task() {
        let store = TaskStore::new();
        let ids = store.add(["https://a.example/1", "https://b.example/2"]).await;
        store.begin_run().await.unwrap();
        store.begin_task(&ids[0]).await.unwrap();

        assert_eq!(
            store.remove(&ids[0]).await,
            Err(QueueError::TaskBusy(ids[0].clone()))
        );
        assert_eq!(store.remove(&ids[1]).await, Ok(true));
        assert_eq!(store.remove(&ids[1]).await, Ok(false));
    }

    #[tokio::test]
    async fn clear_is_rejected_during_run() {
        let store = TaskStore::new();
        store.add(["https://a.example/1"]).await;
        store.begin_run().await.unwrap();
        assert_eq!(store.clear().await, Err(QueueError::RunActive));

        store.end_run().await;
        assert_eq!(store.clear().await, Ok(1));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn clear_completed_only_removes_completed() {
        let store = TaskStore::new();
        let ids = store.add(["https://a.example/1", "https://b.example/2"]).await;
        store.begin_run().await.unwrap();
        store.begin_task(&ids[0]).await;
        store
            .settle_task(&ids[0], TaskPatch::default().status(TaskStatus::Completed))
            .await;
        store.end_run().await;

        assert_eq!(store.clear_completed().await, 1);
        let snap = store.snapshot().await;
        assert_eq!(urls(&snap), vec!["https://b.example/2"]);
    }

    #[tokio::test]
    async fn patch_is_noop_for_missing_task() {
        let store = TaskStore::new();
        let missing = TaskId::from("missing");
        assert!(store
            .patch(&missing, TaskPatch::default().progress(10.0))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn patch_rejects_skipping_downloading() {
        let store = TaskStore::new();
        let ids = store.add(["https://a.example/1"]).await;
        let res = store
            .patch(&ids[0], TaskPatch::default().status(TaskStatus::Completed))
            .await;
        assert!(res.is_none());
        assert_eq!(store.get(&ids[0]).await.unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn begin_run_resets_previous_outcomes() {
        let store = TaskStore::new();
        let ids = store.add(["https://a.example/1"]).await;
        store.begin_run().await.unwrap();
        store.begin_task(&ids[0]).await;
        store
            .settle_task(
                &ids[0],
                TaskPatch::default().status(TaskStatus::Error).error("boom"),
            )
            .await;
        store.end_run().await;

        store.begin_run().await.unwrap();
        let task = store.get(&ids[0]).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.error, None);
    }

    #[tokio::test]
    async fn begin_run_rejects_empty_and_concurrent() {
        let store = TaskStore::new();
        assert_eq!(store.begin_run().await, Err(QueueError::EmptyQueue));
        store.add(["https://a.example/1"]).await;
        store.begin_run().await.unwrap();
        assert_eq!(store.begin_run().await, Err(QueueError::AlreadyRunning));
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let store = TaskStore::new();
        let ids = store.add(["https://a.example/1", "https://b.example/2"]).await;
        store.begin_run().await.unwrap();
        store.begin_task(&ids[0]).await;
        let stats = store.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.downloading, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let store = TaskStore::new();
        let mut rx = store.subscribe();
        let ids = store.add(["https://a.example/1"]).await;
        match rx.recv().await {
            Ok(QueueEvent::TaskAdded { task }) => assert_eq!(task.id, ids[0]),
            other => panic!("expected TaskAdded, got {other:?}"),
        }
        store.remove(&ids[0]).await.unwrap();
        match rx.recv().await {
            Ok(QueueEvent::TasksRemoved { ids: removed }) => assert_eq!(removed, ids),
            other => panic!("expected TasksRemoved, got {other:?}"),
        }
    }
}
