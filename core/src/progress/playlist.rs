use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::task::TaskId;

/// The playlist the engine is currently expanding, independent of which task
/// is rendered as active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistContext {
    /// Task whose progress published this context.
    pub task_id: TaskId,
    pub title: String,
    pub index: u32,
    pub total: u32,
}

#[derive(Clone, Default)]
pub struct PlaylistContextCell {
    inner: Arc<RwLock<Option<PlaylistContext>>>,
}

impl PlaylistContextCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<PlaylistContext> {
        self.inner.read().await.clone()
    }

    /// Returns true when the stored value changed.
    pub async fn set(&self, ctx: PlaylistContext) -> bool {
        let mut guard = self.inner.write().await;
        if guard.as_ref() == Some(&ctx) {
            return false;
        }
        *guard = Some(ctx);
        true
    }

    /// Returns true when a context was present.
    pub async fn clear(&self) -> bool {
        self.inner.write().await.take().is_some()
    }

    /// Clear only if the context was published by `task_id`.
    pub async fn clear_if_owner(&self, task_id: &TaskId) -> bool {
        let mut guard = self.inner.write().await;
        if guard.as_ref().is_some_and(|c| &c.task_id == task_id) {
            *guard = None;
            return true;
        }
        false
    }
}
