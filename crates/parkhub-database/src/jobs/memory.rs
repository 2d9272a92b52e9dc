//! In-memory job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use parkhub_core::error::AppError;
use parkhub_core::result::AppResult;
use parkhub_core::types::id::JobId;
use parkhub_entity::job::{CreateJob, Job, JobStatus};

use super::JobStore;

/// Job store kept in a vector; insertion order breaks priority ties.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<Job>>,
}

impl MemoryJobStore {
    /// Create an empty job store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every job, oldest first.
    pub async fn all(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }
}

fn missing(id: JobId) -> AppError {
    AppError::not_found(format!("Job {id} not found"))
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, data: &CreateJob, now: DateTime<Utc>) -> AppResult<Job> {
        let job = Job {
            id: JobId::new(),
            job_type: data.job_type.clone(),
            queue: data.queue.clone(),
            priority: data.priority,
            payload: data.payload.clone(),
            result: None,
            error_message: None,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: data.max_attempts,
            scheduled_at: data.scheduled_at,
            started_at: None,
            completed_at: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().await.push(job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.lock().await.iter().find(|j| j.id == id).cloned())
    }

    async fn claim_next(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let mut jobs = self.jobs.lock().await;
        let mut best: Option<usize> = None;
        for (idx, job) in jobs.iter().enumerate() {
            let eligible = job.queue == queue
                && job.status == JobStatus::Pending
                && job.scheduled_at.is_none_or(|at| at <= now);
            if !eligible {
                continue;
            }
            match best {
                Some(b) if jobs[b].priority >= job.priority => {}
                _ => best = Some(idx),
            }
        }

        Ok(best.map(|idx| {
            let job = &mut jobs[idx];
            job.status = JobStatus::Running;
            job.attempts += 1;
            job.started_at = Some(now);
            job.worker_id = Some(worker_id.to_string());
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn complete(
        &self,
        id: JobId,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id).ok_or_else(|| missing(id))?;
        job.status = JobStatus::Completed;
        job.result = result.cloned();
        job.error_message = None;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id).ok_or_else(|| missing(id))?;
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn reschedule(&self, id: JobId, error: &str, run_at: DateTime<Utc>) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| j.id == id).ok_or_else(|| missing(id))?;
        job.status = JobStatus::Pending;
        job.error_message = Some(error.to_string());
        job.scheduled_at = Some(run_at);
        job.started_at = None;
        job.worker_id = None;
        Ok(())
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut jobs = self.jobs.lock().await;
        let mut count = 0;
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Running && job.started_at.is_some_and(|s| s < cutoff) {
                job.status = JobStatus::Pending;
                job.started_at = None;
                job.worker_id = None;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        Ok(self
            .jobs
            .lock()
            .await
            .iter()
            .filter(|j| j.status == status)
            .count() as i64)
    }

    async fn cleanup_old(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut jobs = self.jobs.lock().await;
        let len = jobs.len();
        jobs.retain(|j| !(j.status.is_terminal() && j.completed_at.is_some_and(|at| at < before)));
        Ok((len - jobs.len()) as u64)
    }
}
