//! Task Record Store: the ordered, in-memory list of download tasks.

pub mod source;
pub mod store;
pub mod transitions;
pub mod types;

pub use source::{is_playlist_url, parse_url_list, validate_url, SourcePlatform};
pub use store::{QueueStats, TaskStore};
pub use transitions::{StatusTransition, TransitionError};
pub use types::{PlaylistPosition, Task, TaskId, TaskPatch, TaskStatus};
