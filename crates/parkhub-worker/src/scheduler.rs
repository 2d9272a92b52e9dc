//! Cron scheduler that drives the cadence tick and job-table upkeep.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use parkhub_core::config::WorkerConfig;
use parkhub_core::error::AppError;

use crate::cadence::CadenceScheduler;
use crate::queue::JobQueue;

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Decides which sweeps are due
    cadence: Arc<CadenceScheduler>,
    /// Job queue for stale recovery
    queue: Arc<JobQueue>,
    /// Running jobs older than this are requeued
    stale_after: Duration,
    /// Finished jobs older than this are deleted
    job_retention: Duration,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("stale_after", &self.stale_after)
            .field("job_retention", &self.job_retention)
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(
        cadence: Arc<CadenceScheduler>,
        queue: Arc<JobQueue>,
        config: &WorkerConfig,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            cadence,
            queue,
            stale_after: Duration::from_secs(config.stale_after_seconds),
            job_retention: Duration::from_secs(u64::from(config.job_retention_days) * 86_400),
        })
    }

    /// Register all default scheduled tasks
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        self.register_cadence_tick().await?;
        self.register_stale_recovery().await?;
        self.register_job_cleanup().await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Cadence tick: every minute, enqueue whichever sweeps are due
    async fn register_cadence_tick(&self) -> Result<(), AppError> {
        let cadence = Arc::clone(&self.cadence);
        let queue = Arc::clone(&self.queue);
        let job = CronJob::new_async("0 * * * * *", move |_uuid, _lock| {
            let cadence = Arc::clone(&cadence);
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                let fired = cadence.fire_due(queue.now()).await;
                for name in fired {
                    tracing::info!("Scheduled task '{}' enqueued", name);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create cadence schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add cadence schedule: {}", e)))?;

        tracing::info!("Registered: cadence_tick (every 1min)");
        Ok(())
    }

    /// Stale job recovery, every 5 minutes
    async fn register_stale_recovery(&self) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let stale_after = self.stale_after;
        let job = CronJob::new_async("0 */5 * * * *", move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::debug!("Checking for stale running jobs");
                if let Err(e) = queue.requeue_stale(stale_after).await {
                    tracing::error!("Failed to requeue stale jobs: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create stale_recovery schedule: {}", e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add stale_recovery schedule: {}", e))
        })?;

        tracing::info!(
            "Registered: stale_recovery (every 5min, threshold {}s)",
            stale_after.as_secs()
        );
        Ok(())
    }

    /// Finished job cleanup, daily at 03:00
    async fn register_job_cleanup(&self) -> Result<(), AppError> {
        let queue = Arc::clone(&self.queue);
        let retention = self.job_retention;
        let job = CronJob::new_async("0 0 3 * * *", move |_uuid, _lock| {
            let queue = Arc::clone(&queue);
            Box::pin(async move {
                tracing::debug!("Cleaning up finished jobs");
                if let Err(e) = queue.cleanup_old(retention).await {
                    tracing::error!("Failed to clean up finished jobs: {}", e);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create job_cleanup schedule: {}", e)))?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add job_cleanup schedule: {}", e))
        })?;

        tracing::info!(
            "Registered: job_cleanup (daily 03:00, retention {}d)",
            retention.as_secs() / 86_400
        );
        Ok(())
    }
}
