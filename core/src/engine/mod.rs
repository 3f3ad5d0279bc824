//! Engine Adapter boundary: the external download engine is reached through
//! one blocking call per task plus a fire-and-forget cancel.

mod traits;
mod types;

pub use traits::EngineAdapter;
pub use types::{DownloadRequest, OutputFormat, Quality, QueueSettings};
