//! Built-in job handler implementations.

pub mod announce;
pub mod export;
pub mod reminder;
pub mod report;
pub mod search_sync;

pub use announce::AnnounceJobHandler;
pub use export::ExportJobHandler;
pub use reminder::ReminderSweepHandler;
pub use report::MonthlyReportHandler;
pub use search_sync::SearchSyncHandler;

use parkhub_entity::job::{Job, Task};

use crate::delivery::DeliveryError;
use crate::executor::JobExecutionError;

/// Map a delivery failure that exhausted the outbox retries.
pub(crate) fn delivery_failure(err: DeliveryError) -> JobExecutionError {
    if err.is_transient() {
        JobExecutionError::Transient(err.to_string())
    } else {
        JobExecutionError::Permanent(err.to_string())
    }
}

pub(crate) fn unexpected_payload(job: &Job, task: &Task) -> JobExecutionError {
    JobExecutionError::Permanent(format!(
        "Job {} of type '{}' carries a '{}' payload",
        job.id,
        job.job_type,
        task.job_type()
    ))
}
