//! Worker runner: main loop that polls for jobs and executes them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore, watch};
use tokio::time;
use tracing;

use parkhub_core::config::WorkerConfig;
use parkhub_entity::job::Job;

use crate::executor::{JobExecutionError, JobExecutor};
use crate::queue::{DEFAULT_QUEUES, JobQueue};

/// How a finished job was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Completed successfully.
    Completed,
    /// Failed and put back for another attempt.
    Retried,
    /// Failed for good.
    Failed,
}

/// Main worker runner that polls queues and executes jobs
#[derive(Debug)]
pub struct WorkerRunner {
    /// Job queue for polling
    queue: Arc<JobQueue>,
    /// Job executor for dispatching
    executor: Arc<JobExecutor>,
    /// Worker configuration
    config: WorkerConfig,
    /// Queues to poll (in priority order)
    queues: Vec<String>,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(queue: Arc<JobQueue>, executor: Arc<JobExecutor>, config: WorkerConfig) -> Self {
        Self {
            queue,
            executor,
            config,
            queues: DEFAULT_QUEUES.iter().map(|q| q.to_string()).collect(),
        }
    }

    /// Set the queues to poll
    pub fn with_queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    /// Start the worker runner; runs until the cancel signal is received
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let worker_id = self.queue.worker_id().to_string();
        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            "Worker '{}' started with concurrency={}, poll_interval={}s, queues={:?}",
            worker_id,
            concurrency,
            self.config.poll_interval_seconds,
            self.queues
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let slot_freed = Arc::new(Notify::new());
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            if *cancel.borrow() {
                break;
            }

            let dispatched = self.poll_and_execute(&semaphore, &slot_freed).await;
            if dispatched {
                continue;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Worker '{}' received shutdown signal", worker_id);
                        break;
                    }
                }
                _ = self.queue.notified() => {}
                _ = slot_freed.notified() => {}
                _ = time::sleep(poll_interval) => {}
            }
        }

        tracing::info!(
            "Worker '{}' waiting for in-flight jobs to complete...",
            worker_id
        );

        let max_permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        if time::timeout(Duration::from_secs(30), semaphore.acquire_many(max_permits))
            .await
            .is_err()
        {
            tracing::warn!("Worker '{}' timed out waiting for in-flight jobs", worker_id);
        }

        tracing::info!("Worker '{}' shut down complete", worker_id);
    }

    /// Process queued jobs one at a time until none is runnable.
    ///
    /// Returns the number of jobs processed. Jobs rescheduled for later
    /// are not waited for.
    pub async fn run_until_idle(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.queue.dequeue(&self.queue_refs()).await {
                Ok(Some(job)) => {
                    process_job(&self.queue, &self.executor, &self.config, job).await;
                    processed += 1;
                }
                Ok(None) => return processed,
                Err(e) => {
                    tracing::error!("Failed to dequeue job: {}", e);
                    return processed;
                }
            }
        }
    }

    fn queue_refs(&self) -> Vec<&str> {
        self.queues.iter().map(|s| s.as_str()).collect()
    }

    /// Poll for a job and spawn it if a slot is free. Returns whether a
    /// job was dispatched.
    ///
    /// The spawned task signals `slot_freed` after releasing its permit.
    async fn poll_and_execute(
        &self,
        semaphore: &Arc<Semaphore>,
        slot_freed: &Arc<Notify>,
    ) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied, waiting...");
                return false;
            }
        };

        match self.queue.dequeue(&self.queue_refs()).await {
            Ok(Some(job)) => {
                let queue = Arc::clone(&self.queue);
                let executor = Arc::clone(&self.executor);
                let config = self.config.clone();
                let slot_freed = Arc::clone(slot_freed);

                tokio::spawn(async move {
                    process_job(&queue, &executor, &config, job).await;
                    drop(permit);
                    slot_freed.notify_one();
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No jobs available in queues");
                false
            }
            Err(e) => {
                tracing::error!("Failed to dequeue job: {}", e);
                false
            }
        }
    }
}

/// Execute one claimed job and record the outcome.
///
/// Retryable failures go back to the queue with a linear backoff until
/// the job's attempts are used up.
pub async fn process_job(
    queue: &JobQueue,
    executor: &JobExecutor,
    config: &WorkerConfig,
    job: Job,
) -> JobOutcome {
    let job_id = job.id;

    let error = match executor.execute(&job).await {
        Ok(result) => {
            if let Err(e) = queue.complete(job_id, result).await {
                tracing::error!("Failed to mark job {} as completed: {}", job_id, e);
            }
            tracing::info!("Job {} completed successfully", job_id);
            return JobOutcome::Completed;
        }
        Err(e) => e,
    };

    let msg = error.to_string();
    if error.is_retryable() && job.has_attempts_left() {
        let backoff = Duration::from_secs(
            config
                .retry_backoff_seconds
                .saturating_mul(u64::try_from(job.attempts).unwrap_or(1)),
        );
        tracing::warn!(
            "Job {} failed (attempt {}/{}), retrying in {}s: {}",
            job_id,
            job.attempts,
            job.max_attempts,
            backoff.as_secs(),
            msg
        );
        if let Err(e) = queue.retry_later(job_id, &msg, backoff).await {
            tracing::error!("Failed to reschedule job {}: {}", job_id, e);
        }
        return JobOutcome::Retried;
    }

    match error {
        JobExecutionError::Permanent(_) => {
            tracing::error!("Job {} failed permanently: {}", job_id, msg)
        }
        _ => tracing::error!(
            "Job {} failed after {} attempts: {}",
            job_id,
            job.attempts,
            msg
        ),
    }
    if let Err(e) = queue.fail(job_id, &msg).await {
        tracing::error!("Failed to mark job {} as failed: {}", job_id, e);
    }
    JobOutcome::Failed
}
