use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::QueueSettings;
use crate::orchestrator::OrchestratorOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "mediaq_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Settings used for a run unless overridden on the command line.
    #[serde(default)]
    pub defaults: QueueSettings,

    /// Upper bound on a single engine call. Unset means no timeout.
    #[serde(default)]
    pub engine_timeout_secs: Option<u64>,

    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_progress_channel_capacity() -> usize {
    256
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            defaults: QueueSettings::default(),
            engine_timeout_secs: None,
            progress_channel_capacity: default_progress_channel_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            engine_timeout: self
                .engine_timeout_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            progress_channel_capacity: self.progress_channel_capacity,
            event_channel_capacity: self.event_channel_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// yt-dlp executable name or path.
    #[serde(default = "default_engine_binary")]
    pub binary: String,

    /// Extra arguments appended before the URL.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// How long to wait for a killed engine process to exit.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Bytes of engine stderr kept for failure classification.
    #[serde(default = "default_stderr_tail_bytes")]
    pub stderr_tail_bytes: usize,
}

fn default_engine_binary() -> String {
    "yt-dlp".to_string()
}

fn default_cancel_grace_ms() -> u64 {
    2000
}

fn default_stderr_tail_bytes() -> usize {
    16 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            extra_args: Vec::new(),
            cancel_grace_ms: default_cancel_grace_ms(),
            stderr_tail_bytes: default_stderr_tail_bytes(),
        }
    }
}
