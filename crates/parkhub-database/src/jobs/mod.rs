//! Persistent job store backing the task queue.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parkhub_core::result::AppResult;
use parkhub_core::types::id::JobId;
use parkhub_entity::job::{CreateJob, Job, JobStatus};

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

/// Storage for background jobs with at-least-once claim semantics.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a new pending job.
    async fn create(&self, data: &CreateJob, now: DateTime<Utc>) -> AppResult<Job>;

    /// Find a job by id.
    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Claim the next eligible pending job of a queue.
    ///
    /// Eligible means `scheduled_at` is unset or not after `now`. The
    /// highest priority wins, then the oldest. The claimed job is
    /// `running` with its attempt counter incremented.
    async fn claim_next(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Mark a job completed.
    async fn complete(
        &self,
        id: JobId,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark a job permanently failed.
    async fn fail(&self, id: JobId, error: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Return a job to `pending`, eligible again at `run_at`.
    async fn reschedule(&self, id: JobId, error: &str, run_at: DateTime<Utc>) -> AppResult<()>;

    /// Return `running` jobs started before `cutoff` to `pending`.
    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Count jobs in a status.
    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64>;

    /// Delete completed and failed jobs that finished before `before`.
    async fn cleanup_old(&self, before: DateTime<Utc>) -> AppResult<u64>;
}
