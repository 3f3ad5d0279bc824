use std::sync::Arc;

use mediaq_core::config::EngineConfig;
use mediaq_core::EngineAdapter;

use crate::ytdlp::YtDlpEngine;

pub fn build_engine(cfg: &EngineConfig) -> Arc<dyn EngineAdapter> {
    tracing::debug!(binary = %cfg.binary, extra_args = cfg.extra_args.len(), "building yt-dlp engine");
    Arc::new(YtDlpEngine::new(cfg.clone()))
}
