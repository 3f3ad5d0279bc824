//! yt-dlp engine adapter.

mod args;
mod engine;
mod errors;
mod parse;

pub use args::{build_args, build_format_string};
pub use engine::YtDlpEngine;
pub use errors::classify_failure;
pub use parse::{title_from_path, OutputTracker};
