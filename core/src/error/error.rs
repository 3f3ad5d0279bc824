use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("config error: {0}")]
    Config(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Rejections surfaced by the queue's write operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    EmptyQueue,
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("operation not allowed while a run is active")]
    RunActive,
    #[error("task busy: {0}")]
    TaskBusy(TaskId),
    #[error("run loop aborted: {0}")]
    RunAborted(String),
}
