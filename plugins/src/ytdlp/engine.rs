use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediaq_core::config::EngineConfig;
use mediaq_core::util::RingBytes;
use mediaq_core::{DownloadRequest, EngineAdapter, EngineFailure, ProgressTx};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::args::build_args;
use super::errors::classify_failure;
use super::parse::OutputTracker;

/// Runs one `yt-dlp` child process per download.
pub struct YtDlpEngine {
    config: EngineConfig,
    /// Replaced on every `cancel`, so a new download never sees a stale signal.
    cancel_all: Mutex<CancellationToken>,
}

impl YtDlpEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel_all: Mutex::new(CancellationToken::new()),
        }
    }

    async fn abort(&self, mut child: Child, task_id: &str) -> Result<(), EngineFailure> {
        if let Err(e) = child.start_kill() {
            tracing::debug!(task_id, error = %e, "engine process already gone");
        }
        let grace = Duration::from_millis(self.config.cancel_grace_ms);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(task_id, status = %status, "engine process stopped");
            }
            Ok(Err(e)) => tracing::warn!(task_id, error = %e, "failed to reap engine process"),
            Err(_) => tracing::warn!(
                task_id,
                grace_ms = self.config.cancel_grace_ms,
                "engine process did not exit within grace period"
            ),
        }
        Err(EngineFailure::Cancelled)
    }
}

fn pump_stderr<R>(rd: R, ring: Arc<RingBytes>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(rd).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!(target: "mediaq::engine::stderr", "{line}");
            ring.push_line(&line);
        }
    })
}

#[async_trait]
impl EngineAdapter for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: ProgressTx,
        cancel: CancellationToken,
    ) -> Result<(), EngineFailure> {
        let task_id = request.task_id.as_str();
        let cancel_all = self.cancel_all.lock().await.clone();
        let args = build_args(request, &self.config.extra_args);
        tracing::debug!(task_id, binary = %self.config.binary, args = ?args, "spawning engine");

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineFailure::Spawn(format!("{}: {e}", self.config.binary)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineFailure::Spawn("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineFailure::Spawn("stderr not captured".into()))?;

        let tail = RingBytes::new(self.config.stderr_tail_bytes);
        let stderr_pump = pump_stderr(stderr, tail.clone());
        let mut lines = BufReader::new(stdout).lines();
        let mut tracker = OutputTracker::new(request.task_id.clone());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abort(child, task_id).await,
                _ = cancel_all.cancelled() => return self.abort(child, task_id).await,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        tracing::trace!(target: "mediaq::engine::stdout", "{line}");
                        if let Some(event) = tracker.feed(&line) {
                            if progress.send(event).await.is_err() {
                                tracing::debug!(task_id, "progress receiver closed");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(task_id, error = %e, "failed reading engine output");
                        break;
                    }
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.abort(child, task_id).await,
            _ = cancel_all.cancelled() => return self.abort(child, task_id).await,
            status = child.wait() => status.map_err(|e| EngineFailure::Spawn(e.to_string()))?,
        };
        let _ = stderr_pump.await;

        if status.success() {
            let _ = progress.send(tracker.finished()).await;
            return Ok(());
        }

        let failure = classify_failure(status.code(), &tail.to_string_lossy());
        tracing::debug!(task_id, exit_code = ?status.code(), kind = failure.kind(), "engine exited with failure");
        Err(failure)
    }

    async fn cancel(&self) {
        let mut guard = self.cancel_all.lock().await;
        guard.cancel();
        *guard = CancellationToken::new();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use super::*;
    use mediaq_core::progress::progress_channel;
    use mediaq_core::{EngineStatus, OutputFormat, Quality, TaskId};
    use pretty_assertions::assert_eq;

    fn fake_engine(dir: &Path, body: &str) -> YtDlpEngine {
        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        YtDlpEngine::new(EngineConfig {
            binary: path.to_string_lossy().into_owned(),
            cancel_grace_ms: 500,
            ..Default::default()
        })
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            task_id: TaskId::from("t1"),
            url: "https://youtu.be/abc".into(),
            output_dir: "/tmp".into(),
            quality: Quality::Best,
            format: OutputFormat::Mp4,
            download_playlist: false,
        }
    }

    #[tokio::test]
    async fn reports_progress_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            dir.path(),
            r#"echo "[download] Destination: /tmp/Clip.mp4"
echo "[download]  50.0% of 2MiB at 1MiB/s ETA 00:01"
echo "[download] 100% of 2MiB in 00:02"
exit 0"#,
        );
        let (tx, mut rx) = progress_channel(16);

        let outcome = engine
            .download(&request(), tx, CancellationToken::new())
            .await;
        assert_eq!(outcome, Ok(()));

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].percent, 50.0);
        assert_eq!(events[0].title.as_deref(), Some("Clip"));
        assert_eq!(events[2].status, EngineStatus::Finished);
    }

    #[tokio::test]
    async fn classifies_failed_exit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            dir.path(),
            "echo 'ERROR: Unsupported URL: https://youtu.be/abc' >&2\nexit 1",
        );
        let (tx, _rx) = progress_channel(16);

        let outcome = engine
            .download(&request(), tx, CancellationToken::new())
            .await;
        assert!(matches!(outcome, Err(EngineFailure::Unsupported(_))));
    }

    #[tokio::test]
    async fn cancel_kills_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(fake_engine(
            dir.path(),
            "echo '[download]   1.0% of 2MiB at 1MiB/s ETA 01:00'\nexec sleep 30",
        ));
        let (tx, mut rx) = progress_channel(16);

        let call = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .download(&request(), tx, CancellationToken::new())
                    .await
            })
        };
        rx.recv().await.unwrap();
        engine.cancel().await;

        let outcome = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Err(EngineFailure::Cancelled));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let engine = YtDlpEngine::new(EngineConfig {
            binary: "/nonexistent/yt-dlp".into(),
            ..Default::default()
        });
        let (tx, _rx) = progress_channel(1);
        let outcome = engine
            .download(&request(), tx, CancellationToken::new())
            .await;
        assert!(matches!(outcome, Err(EngineFailure::Spawn(_))));
    }
}
