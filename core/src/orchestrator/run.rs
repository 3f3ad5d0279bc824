use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::engine::DownloadRequest;
use crate::error::EngineFailure;
use crate::events::QueueEvent;
use crate::progress::{progress_channel, ProgressTx};
use crate::task::{TaskId, TaskPatch, TaskStatus};

use super::orchestrator::OrchestratorInner;
use super::types::{RunContext, RunPhase, RunSummary};

pub(super) async fn run_loop(
    inner: Arc<OrchestratorInner>,
    ctx: RunContext,
    ids: Vec<TaskId>,
) -> RunSummary {
    let started_at = Utc::now();
    let clock = Instant::now();
    let mut stopped = false;

    for id in &ids {
        // `stop` cancels under the run slot lock, so it either lands before
        // this check or finds the task already in flight.
        let begun = {
            let _slot = inner.run.lock().await;
            if ctx.cancel.is_cancelled() {
                None
            } else {
                Some(inner.store.begin_task(id).await)
            }
        };
        let Some(begun) = begun else {
            tracing::info!(run_id = %ctx.run_id, "stop observed, remaining tasks stay pending");
            stopped = true;
            break;
        };
        let Some(task) = begun else {
            tracing::debug!(run_id = %ctx.run_id, task_id = %id, "task removed before its turn");
            continue;
        };

        let request = DownloadRequest::new(&task, &ctx.settings);
        tracing::info!(
            run_id = %ctx.run_id,
            task_id = %id,
            attempt = task.attempt,
            url = %task.url,
            "download started"
        );

        let call_started = Instant::now();
        let outcome = call_engine(&inner, &ctx, &request, task.attempt).await;
        let patch = resolve(&ctx, id, outcome, call_started.elapsed().as_millis() as u64);
        if patch.status == Some(TaskStatus::Cancelled) && ctx.cancel.is_cancelled() {
            stopped = true;
        }
        inner.store.settle_task(id, patch).await;
    }

    inner.store.end_run().await;
    inner.clear_playlist_context().await;

    let mut summary = RunSummary {
        run_id: ctx.run_id.clone(),
        started_at: Some(started_at),
        duration_ms: clock.elapsed().as_millis() as u64,
        stopped,
        ..Default::default()
    };
    let snapshot = inner.store.snapshot().await;
    for task in snapshot.iter().filter(|t| ids.contains(&t.id)) {
        summary.total += 1;
        match task.status {
            TaskStatus::Completed => summary.completed += 1,
            TaskStatus::Error => summary.failed += 1,
            TaskStatus::Cancelled => summary.cancelled += 1,
            TaskStatus::Pending | TaskStatus::Downloading => summary.pending += 1,
        }
    }

    {
        let mut slot = inner.run.lock().await;
        slot.phase = RunPhase::Idle;
        slot.cancel = None;
        slot.run_id = None;
    }

    tracing::info!(
        run_id = %summary.run_id,
        completed = summary.completed,
        failed = summary.failed,
        cancelled = summary.cancelled,
        pending = summary.pending,
        stopped = summary.stopped,
        duration_ms = summary.duration_ms,
        "run finished"
    );
    inner.store.emit(QueueEvent::PhaseChanged {
        phase: RunPhase::Idle,
    });
    inner.store.emit(QueueEvent::RunFinished {
        summary: summary.clone(),
    });
    summary
}

/// Progress sender for one engine call. Events are stamped with the call's
/// attempt on their way to the reconciler, so anything the engine emits
/// after the call resolved can't land on a later attempt. The forwarder
/// exits once the engine drops every clone.
fn attempt_sender(inner: &OrchestratorInner, attempt: u64) -> ProgressTx {
    let (tx, mut rx) = progress_channel(inner.options.progress_channel_capacity);
    let upstream = inner.progress_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if upstream.send(event.with_attempt(attempt)).await.is_err() {
                break;
            }
        }
    });
    tx
}

async fn call_engine(
    inner: &OrchestratorInner,
    ctx: &RunContext,
    request: &DownloadRequest,
    attempt: u64,
) -> Result<(), EngineFailure> {
    let call_cancel = ctx.cancel.child_token();
    let call = inner
        .engine
        .download(request, attempt_sender(inner, attempt), call_cancel.clone());

    let Some(limit) = inner.options.engine_timeout else {
        return call.await;
    };

    match tokio::time::timeout(limit, call).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                run_id = %ctx.run_id,
                task_id = %request.task_id,
                timeout_ms = limit.as_millis() as u64,
                "engine call timed out"
            );
            call_cancel.cancel();
            inner.engine.cancel().await;
            Err(EngineFailure::TimedOut(limit))
        }
    }
}

/// Map the call outcome to the task's terminal patch. After a user stop any
/// failure of the in-flight task is `cancelled`, never `error`.
fn resolve(
    ctx: &RunContext,
    id: &TaskId,
    outcome: Result<(), EngineFailure>,
    elapsed_ms: u64,
) -> TaskPatch {
    let base = TaskPatch::default().speed("").eta("");
    match outcome {
        Ok(()) => {
            tracing::info!(run_id = %ctx.run_id, task_id = %id, elapsed_ms, "download completed");
            base.status(TaskStatus::Completed).progress(100.0)
        }
        Err(failure) if failure.is_cancellation() || ctx.cancel.is_cancelled() => {
            tracing::info!(
                run_id = %ctx.run_id,
                task_id = %id,
                reason = %failure,
                "download cancelled"
            );
            base.status(TaskStatus::Cancelled)
        }
        Err(failure) => {
            tracing::warn!(
                run_id = %ctx.run_id,
                task_id = %id,
                error.kind = failure.kind(),
                error.message = %failure,
                "download failed"
            );
            base.status(TaskStatus::Error).error(failure.message())
        }
    }
}
