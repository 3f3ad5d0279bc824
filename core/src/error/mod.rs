#[allow(clippy::module_inception)]
pub mod error;
pub mod engine;

pub use engine::EngineFailure;
pub use error::{CliError, QueueError};
