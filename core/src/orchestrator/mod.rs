//! Queue Orchestrator: sequences queued tasks through the engine, one at a
//! time, with cooperative cancellation.
//!
//! ```text
//!        start (queue non-empty)
//!  Idle ────────────────────────▶ Running
//!   ▲                               │ stop
//!   │  loop exit                    ▼
//!   └──────────────────────────── Stopping
//! ```

#[allow(clippy::module_inception)]
mod orchestrator;
mod run;
mod types;

pub use orchestrator::QueueOrchestrator;
pub use types::{OrchestratorOptions, RunHandle, RunPhase, RunSummary};
