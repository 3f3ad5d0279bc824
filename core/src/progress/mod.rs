//! Progress Reconciler: applies the engine's asynchronous progress stream to
//! the task store.

mod event;
mod playlist;
mod reconciler;

pub use event::{progress_channel, EngineStatus, ProgressEvent, ProgressRx, ProgressTx};
pub use playlist::{PlaylistContext, PlaylistContextCell};
pub use reconciler::{aggregate_percent, Reconciler};
