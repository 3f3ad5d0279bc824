#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediaq_core::{DownloadRequest, EngineAdapter, EngineFailure, ProgressEvent, ProgressTx};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What the scripted engine does for one URL.
#[derive(Clone)]
pub enum Script {
    /// Emit the events (ids filled in), then resolve.
    Resolve {
        events: Vec<ProgressEvent>,
        outcome: Result<(), EngineFailure>,
    },
    /// Emit the events, then wait for cancellation and resolve with `outcome`.
    HoldUntilCancelled {
        events: Vec<ProgressEvent>,
        outcome: Result<(), EngineFailure>,
    },
    /// Resolve with `outcome` at once, but emit `event` from a detached task
    /// `after` the call has returned.
    LateEvent {
        event: ProgressEvent,
        after: Duration,
        outcome: Result<(), EngineFailure>,
    },
    /// Sleep, then succeed.
    Delay(Duration),
    /// Never resolve on its own.
    Hang,
}

impl Script {
    pub fn ok() -> Self {
        Self::Resolve {
            events: Vec::new(),
            outcome: Ok(()),
        }
    }

    pub fn fail(msg: &str) -> Self {
        Self::Resolve {
            events: Vec::new(),
            outcome: Err(EngineFailure::Network(msg.to_string())),
        }
    }

    pub fn hold() -> Self {
        Self::HoldUntilCancelled {
            events: Vec::new(),
            outcome: Err(EngineFailure::Cancelled),
        }
    }
}

/// In-memory engine driven by per-URL scripts. Unscripted URLs succeed.
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<DownloadRequest>>,
    cancels: AtomicUsize,
    started_tx: mpsc::UnboundedSender<String>,
}

impl ScriptedEngine {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            started_tx,
        });
        (engine, started_rx)
    }

    pub fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

async fn emit(progress: &ProgressTx, request: &DownloadRequest, events: Vec<ProgressEvent>) {
    for mut ev in events {
        ev.id = request.task_id.clone();
        let _ = progress.send(ev).await;
    }
}

#[async_trait]
impl EngineAdapter for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: ProgressTx,
        cancel: CancellationToken,
    ) -> Result<(), EngineFailure> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(Script::ok);
        let _ = self.started_tx.send(request.url.clone());

        match script {
            Script::Resolve { events, outcome } => {
                emit(&progress, request, events).await;
                outcome
            }
            Script::HoldUntilCancelled { events, outcome } => {
                emit(&progress, request, events).await;
                cancel.cancelled().await;
                outcome
            }
            Script::LateEvent {
                mut event,
                after,
                outcome,
            } => {
                event.id = request.task_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = progress.send(event).await;
                });
                outcome
            }
            Script::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Script::Hang => std::future::pending().await,
        }
    }

    async fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Route engine and orchestrator logs through the test harness. Set
/// `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub async fn next_started(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("engine call did not start in time")
        .expect("engine dropped")
}
