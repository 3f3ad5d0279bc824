use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::EngineFailure;
use crate::progress::ProgressTx;

use super::types::DownloadRequest;

#[async_trait]
pub trait EngineAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Download one task. Resolves once the engine reports success or
    /// failure for `request.task_id`.
    ///
    /// Progress goes to `progress` independently of this call's return; the
    /// call may resolve without having sent anything. When `cancel` fires the
    /// adapter should abort and resolve with `EngineFailure::Cancelled`.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: ProgressTx,
        cancel: CancellationToken,
    ) -> Result<(), EngineFailure>;

    /// Ask the engine to abort whatever is in flight. Returns once the signal
    /// is sent, not once the engine has stopped. Partial output is left as is.
    async fn cancel(&self);
}
