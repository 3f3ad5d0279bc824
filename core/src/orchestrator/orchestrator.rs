use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::{EngineAdapter, QueueSettings};
use crate::error::QueueError;
use crate::events::QueueEvent;
use crate::progress::{progress_channel, PlaylistContext, PlaylistContextCell, ProgressTx, Reconciler};
use crate::task::{QueueStats, Task, TaskId, TaskStore};

use super::run;
use super::types::{OrchestratorOptions, RunContext, RunHandle, RunPhase};

/// Owns the queue, the run state and the reconciler. Cheap to clone; all
/// clones share the same queue.
#[derive(Clone)]
pub struct QueueOrchestrator {
    inner: Arc<OrchestratorInner>,
}

pub(super) struct OrchestratorInner {
    pub(super) store: TaskStore,
    pub(super) playlist: PlaylistContextCell,
    pub(super) engine: Arc<dyn EngineAdapter>,
    pub(super) progress_tx: ProgressTx,
    pub(super) options: OrchestratorOptions,
    pub(super) run: Mutex<RunSlot>,
}

#[derive(Default)]
pub(super) struct RunSlot {
    pub(super) phase: RunPhase,
    pub(super) cancel: Option<CancellationToken>,
    pub(super) run_id: Option<String>,
}

impl OrchestratorInner {
    pub(super) async fn clear_playlist_context(&self) {
        if self.playlist.clear().await {
            self.store
                .emit(QueueEvent::PlaylistContextChanged { context: None });
        }
    }
}

impl QueueOrchestrator {
    /// Create an idle orchestrator with an empty queue.
    ///
    /// Must be called from within a tokio runtime: the progress reconciler is
    /// spawned here and lives as long as the orchestrator.
    pub fn new(engine: Arc<dyn EngineAdapter>, options: OrchestratorOptions) -> Self {
        let store = TaskStore::with_event_capacity(options.event_channel_capacity);
        let playlist = PlaylistContextCell::new();
        let (progress_tx, progress_rx) = progress_channel(options.progress_channel_capacity);
        Reconciler::new(store.clone(), playlist.clone()).spawn(progress_rx);

        tracing::debug!(engine = engine.name(), "orchestrator created");

        Self {
            inner: Arc::new(OrchestratorInner {
                store,
                playlist,
                engine,
                progress_tx,
                options,
                run: Mutex::new(RunSlot::default()),
            }),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.inner.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.store.subscribe()
    }

    pub async fn add<I, S>(&self, urls: I) -> Vec<TaskId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.store.add(urls).await
    }

    pub async fn remove(&self, id: &TaskId) -> Result<bool, QueueError> {
        self.inner.store.remove(id).await
    }

    pub async fn clear(&self) -> Result<usize, QueueError> {
        self.inner.store.clear().await
    }

    pub async fn clear_completed(&self) -> usize {
        self.inner.store.clear_completed().await
    }

    pub async fn snapshot(&self) -> Vec<Task> {
        self.inner.store.snapshot().await
    }

    pub async fn stats(&self) -> QueueStats {
        self.inner.store.stats().await
    }

    pub async fn playlist_context(&self) -> Option<PlaylistContext> {
        self.inner.playlist.get().await
    }

    pub async fn phase(&self) -> RunPhase {
        self.inner.run.lock().await.phase
    }

    pub async fn current_run_id(&self) -> Option<String> {
        self.inner.run.lock().await.run_id.clone()
    }

    /// Start a run over the tasks queued right now.
    ///
    /// Every task is reset to `pending` first. Tasks added afterwards wait
    /// for the next run.
    pub async fn start(&self, settings: QueueSettings) -> Result<RunHandle, QueueError> {
        let mut slot = self.inner.run.lock().await;
        if slot.phase != RunPhase::Idle {
            return Err(QueueError::AlreadyRunning);
        }
        let ids = self.inner.store.begin_run().await?;
        self.inner.clear_playlist_context().await;

        let run_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        slot.phase = RunPhase::Running;
        slot.cancel = Some(cancel.clone());
        slot.run_id = Some(run_id.clone());
        drop(slot);

        tracing::info!(
            run_id = %run_id,
            tasks = ids.len(),
            quality = %settings.quality,
            format = %settings.format,
            output_dir = %settings.output_dir,
            "run started"
        );
        self.inner.store.emit(QueueEvent::PhaseChanged {
            phase: RunPhase::Running,
        });
        self.inner.store.emit(QueueEvent::RunStarted {
            run_id: run_id.clone(),
            total: ids.len(),
            timestamp: Utc::now(),
        });

        let ctx = RunContext {
            run_id: run_id.clone(),
            cancel,
            settings,
        };
        let inner = self.inner.clone();
        let join = tokio::spawn(async move { run::run_loop(inner, ctx, ids).await });

        Ok(RunHandle { run_id, join })
    }

    /// Request the active run to stop. Returns false when idle.
    ///
    /// The in-flight engine call is asked to abort; the loop exits once that
    /// call resolves and the phase then returns to `Idle`.
    pub async fn stop(&self) -> bool {
        let mut slot = self.inner.run.lock().await;
        match slot.phase {
            RunPhase::Idle => return false,
            RunPhase::Running => {
                slot.phase = RunPhase::Stopping;
                self.inner.store.emit(QueueEvent::PhaseChanged {
                    phase: RunPhase::Stopping,
                });
            }
            RunPhase::Stopping => {}
        }
        if let Some(cancel) = slot.cancel.as_ref() {
            cancel.cancel();
        }
        let run_id = slot.run_id.clone().unwrap_or_default();
        drop(slot);

        tracing::info!(run_id = %run_id, "stop requested");
        self.inner.engine.cancel().await;
        self.inner.clear_playlist_context().await;
        true
    }
}
