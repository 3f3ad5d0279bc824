//! mediaq-core: the download queue orchestrator.
//!
//! ```text
//! add(urls) ─▶ TaskStore ─▶ QueueOrchestrator::start(settings)
//!                               │  one task at a time
//!                               ▼
//!                         EngineAdapter::download ──▶ ProgressEvent (mpsc)
//!                               │                          │
//!                               ▼                          ▼
//!                       terminal status            Reconciler ─▶ TaskStore
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod progress;
pub mod task;
pub mod util;

pub use engine::{DownloadRequest, EngineAdapter, OutputFormat, Quality, QueueSettings};
pub use error::{EngineFailure, QueueError};
pub use events::QueueEvent;
pub use orchestrator::{OrchestratorOptions, QueueOrchestrator, RunHandle, RunPhase, RunSummary};
pub use progress::{EngineStatus, PlaylistContext, ProgressEvent, ProgressTx};
pub use task::{Task, TaskId, TaskPatch, TaskStatus, TaskStore};
