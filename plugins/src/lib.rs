//! Engine adapters for mediaq.

pub mod factory;
pub mod ytdlp;
