//! Persistent job queue for enqueuing and dequeuing background jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing;

use parkhub_core::error::AppError;
use parkhub_core::result::AppResult;
use parkhub_core::time::Clock;
use parkhub_core::types::id::JobId;
use parkhub_database::JobStore;
use parkhub_entity::job::{CreateJob, Job, JobStatus, Task};
use parkhub_service::TaskDispatcher;

/// Queue names polled by default, most urgent first
pub const DEFAULT_QUEUES: [&str; 3] = ["default", "scheduled", "maintenance"];

/// Job queue for enqueuing and dequeuing work
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Persistent job storage
    store: Arc<dyn JobStore>,
    /// Time source for scheduling and staleness
    clock: Arc<dyn Clock>,
    /// Worker identifier recorded on claimed jobs
    worker_id: String,
    /// Attempts allowed per job
    max_attempts: i32,
    /// Wakes idle workers when a job arrives
    notify: Arc<Notify>,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        worker_id: String,
        max_attempts: i32,
    ) -> Self {
        Self {
            store,
            clock,
            worker_id,
            max_attempts: max_attempts.max(1),
            notify: Arc::new(Notify::new()),
        }
    }

    /// The worker identifier.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// The current instant of the queue's clock.
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Persist a task as a pending job
    pub async fn enqueue_task(&self, task: &Task) -> Result<Job, AppError> {
        let data = CreateJob {
            job_type: task.job_type().to_string(),
            queue: task.queue().to_string(),
            priority: task.priority(),
            payload: serde_json::to_value(task)?,
            max_attempts: self.max_attempts,
            scheduled_at: None,
        };

        let job = self.store.create(&data, self.clock.now()).await?;
        self.notify.notify_one();

        tracing::debug!(
            "Enqueued job: id={}, type='{}', queue='{}', priority={:?}",
            job.id,
            job.job_type,
            job.queue,
            job.priority
        );

        Ok(job)
    }

    /// Dequeue the next available job from the given queues, in order
    pub async fn dequeue(&self, queues: &[&str]) -> Result<Option<Job>, AppError> {
        let now = self.clock.now();
        for queue in queues {
            if let Some(job) = self.store.claim_next(queue, &self.worker_id, now).await? {
                tracing::debug!(
                    "Dequeued job: id={}, type='{}', queue='{}'",
                    job.id,
                    job.job_type,
                    job.queue
                );
                return Ok(Some(job));
            }
        }

        Ok(None)
    }

    /// Mark a job as completed successfully
    pub async fn complete(
        &self,
        job_id: JobId,
        result: Option<serde_json::Value>,
    ) -> Result<(), AppError> {
        self.store
            .complete(job_id, result.as_ref(), self.clock.now())
            .await?;
        tracing::debug!("Job completed: id={}", job_id);
        Ok(())
    }

    /// Mark a job as permanently failed
    pub async fn fail(&self, job_id: JobId, error: &str) -> Result<(), AppError> {
        self.store.fail(job_id, error, self.clock.now()).await?;
        tracing::debug!("Job failed: id={}, error='{}'", job_id, error);
        Ok(())
    }

    /// Return a job to the queue, runnable again after `delay`
    pub async fn retry_later(
        &self,
        job_id: JobId,
        error: &str,
        delay: Duration,
    ) -> Result<(), AppError> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| AppError::internal(format!("Retry delay out of range: {e}")))?;
        let run_at = self.clock.now() + delay;
        self.store.reschedule(job_id, error, run_at).await?;
        tracing::debug!("Job rescheduled: id={}, run_at={}", job_id, run_at);
        Ok(())
    }

    /// Requeue jobs that have been running for longer than `max_age`
    pub async fn requeue_stale(&self, max_age: Duration) -> Result<u64, AppError> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| AppError::internal(format!("Stale threshold out of range: {e}")))?;
        let count = self.store.requeue_stale(self.clock.now() - max_age).await?;
        if count > 0 {
            tracing::warn!("Requeued {} stale running jobs", count);
            self.notify.notify_one();
        }
        Ok(count)
    }

    /// Delete finished jobs older than `retention`.
    pub async fn cleanup_old(&self, retention: Duration) -> Result<u64, AppError> {
        let retention = chrono::Duration::from_std(retention)
            .map_err(|e| AppError::internal(format!("Retention out of range: {e}")))?;
        let count = self.store.cleanup_old(self.clock.now() - retention).await?;
        if count > 0 {
            tracing::info!("Cleaned up {} finished jobs", count);
        }
        Ok(count)
    }

    /// Wait until a job is enqueued
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Find a job by id
    pub async fn find(&self, job_id: JobId) -> Result<Option<Job>, AppError> {
        self.store.find_by_id(job_id).await
    }

    /// Get queue statistics
    pub async fn stats(&self) -> Result<QueueStats, AppError> {
        Ok(QueueStats {
            pending: self.store.count_by_status(JobStatus::Pending).await?,
            running: self.store.count_by_status(JobStatus::Running).await?,
            failed: self.store.count_by_status(JobStatus::Failed).await?,
            worker_id: self.worker_id.clone(),
        })
    }
}

#[async_trait]
impl TaskDispatcher for JobQueue {
    async fn enqueue(&self, task: Task) -> AppResult<JobId> {
        self.enqueue_task(&task).await.map(|job| job.id)
    }
}

/// Queue statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of pending jobs
    pub pending: i64,
    /// Number of running jobs
    pub running: i64,
    /// Number of failed jobs
    pub failed: i64,
    /// Current worker identifier
    pub worker_id: String,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use parkhub_core::time::ManualClock;
    use parkhub_database::MemoryJobStore;
    use parkhub_entity::job::JobPriority;

    use super::*;

    fn make_queue() -> (JobQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let queue = JobQueue::new(
            Arc::new(MemoryJobStore::new()),
            clock.clone(),
            "worker-test".to_string(),
            3,
        );
        (queue, clock)
    }

    #[tokio::test]
    async fn test_enqueue_routes_by_task() {
        let (queue, _) = make_queue();
        let job = queue.enqueue_task(&Task::MonthlyReportSweep).await.unwrap();

        assert_eq!(job.job_type, "monthly_report_sweep");
        assert_eq!(job.queue, "scheduled");
        assert_eq!(job.priority, JobPriority::Normal);
        assert_eq!(job.max_attempts, 3);

        assert!(queue.dequeue(&["default"]).await.unwrap().is_none());
        let claimed = queue.dequeue(&DEFAULT_QUEUES).await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-test"));
    }

    #[tokio::test]
    async fn test_retry_later_waits_for_clock() {
        let (queue, clock) = make_queue();
        queue.enqueue_task(&Task::DailyReminderSweep).await.unwrap();
        let job = queue.dequeue(&DEFAULT_QUEUES).await.unwrap().unwrap();

        queue
            .retry_later(job.id, "smtp down", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(queue.dequeue(&DEFAULT_QUEUES).await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(30));
        let again = queue.dequeue(&DEFAULT_QUEUES).await.unwrap().unwrap();
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn test_stale_jobs_are_requeued() {
        let (queue, clock) = make_queue();
        queue.enqueue_task(&Task::DailyReminderSweep).await.unwrap();
        queue.dequeue(&DEFAULT_QUEUES).await.unwrap().unwrap();

        assert_eq!(queue.requeue_stale(Duration::from_secs(600)).await.unwrap(), 0);
        clock.advance(chrono::Duration::seconds(601));
        assert_eq!(queue.requeue_stale(Duration::from_secs(600)).await.unwrap(), 1);

        let stats = queue.stats().await.unwrap();
        assert_eq!((stats.pending, stats.running), (1, 0));
    }
}
