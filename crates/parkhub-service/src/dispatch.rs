//! The seam between the engine and the background job pipeline.

use async_trait::async_trait;
use tracing::warn;

use parkhub_core::result::AppResult;
use parkhub_core::types::id::JobId;
use parkhub_entity::job::Task;

/// Hands a task to the out-of-band worker pool.
///
/// Implementations persist the task and return immediately; they never
/// wait for it to run.
#[async_trait]
pub trait TaskDispatcher: Send + Sync + std::fmt::Debug + 'static {
    /// Enqueue a task for at-least-once execution.
    async fn enqueue(&self, task: Task) -> AppResult<JobId>;
}

/// Enqueue follow-up work for an already committed mutation.
///
/// The mutation has succeeded at this point, so a dispatch failure is
/// logged instead of returned.
pub(crate) async fn dispatch_after_commit(dispatcher: &dyn TaskDispatcher, task: Task) {
    let job_type = task.job_type();
    if let Err(e) = dispatcher.enqueue(task).await {
        warn!(job_type, error = %e, "Failed to enqueue follow-up task");
    }
}
