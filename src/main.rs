//! ParkHub Server: reservation engine, background workers and periodic sweeps.
//!
//! Main entry point that wires all crates together and runs until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use parkhub_cache::{CacheManager, ReadCache};
use parkhub_core::config::AppConfig;
use parkhub_core::error::AppError;
use parkhub_core::time::{Clock, SystemClock};
use parkhub_database::Stores;
use parkhub_entity::user::UserRole;
use parkhub_service::{Engine, KeywordIndex, NewUser, rebuild_index};
use parkhub_worker::cadence::local_offset;
use parkhub_worker::jobs::{
    AnnounceJobHandler, ExportJobHandler, MonthlyReportHandler, ReminderSweepHandler,
    SearchSyncHandler,
};
use parkhub_worker::{
    CadenceScheduler, CronScheduler, JobExecutor, JobQueue, LogNotifier, Outbox, WorkerRunner,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("PARKHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting ParkHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Entity store + job store ─────────────────────────
    tracing::info!(
        "Connecting to storage (backend: {})...",
        config.database.backend
    );
    let stores = Stores::connect(&config.database).await?;

    // ── Step 2: Read cache ───────────────────────────────────────
    tracing::info!(
        "Initializing cache (provider: {})...",
        config.cache.provider
    );
    let cache_manager = CacheManager::new(&config.cache).await?;
    let read_cache = Arc::new(ReadCache::new(
        Arc::new(cache_manager),
        Duration::from_secs(config.cache.default_ttl_seconds),
    ));

    // ── Step 3: Job queue ────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let job_queue = Arc::new(JobQueue::new(
        Arc::clone(&stores.jobs),
        Arc::clone(&clock),
        worker_id,
        config.worker.max_attempts,
    ));

    let requeued = job_queue
        .requeue_stale(Duration::from_secs(config.worker.stale_after_seconds))
        .await?;
    if requeued > 0 {
        tracing::info!("Recovered {} jobs left running by a previous process", requeued);
    }

    // ── Step 4: Engine ───────────────────────────────────────────
    let search_index = Arc::new(KeywordIndex::new());
    let engine = Engine::new(
        Arc::clone(&stores.entities),
        Arc::clone(&read_cache),
        job_queue.clone(),
        search_index.clone(),
        Arc::clone(&clock),
        config.allocation.clone(),
    );

    match config.bootstrap.admin_password.clone() {
        Some(password) => {
            let created = engine
                .users
                .ensure_admin(NewUser {
                    username: config.bootstrap.admin_username.clone(),
                    email: config.bootstrap.admin_email.clone(),
                    password,
                    role: UserRole::Admin,
                })
                .await
                .map_err(|e| AppError::internal(format!("Admin bootstrap failed: {}", e)))?;
            if created.is_none() {
                tracing::debug!("Admin account already present");
            }
        }
        None => tracing::warn!("No bootstrap admin password configured, skipping admin setup"),
    }

    // The keyword index is process-local; seed it from the store.
    rebuild_index(stores.entities.as_ref(), search_index.as_ref()).await?;

    let lots = engine
        .query
        .list_lots()
        .await
        .map_err(|e| AppError::internal(format!("Failed to read lots: {}", e)))?;
    tracing::info!("Engine ready ({} lots)", lots.len());

    // ── Step 5: Background worker ────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let offset = local_offset(&config.scheduler)?;
    let outbox = Outbox::new(Arc::new(LogNotifier), &config.delivery);

    let worker_handle = if config.worker.enabled {
        tracing::info!("Starting background worker...");

        let mut job_executor = JobExecutor::new();
        job_executor.register(Arc::new(AnnounceJobHandler::new(outbox.clone())));
        job_executor.register(Arc::new(ExportJobHandler::new(
            Arc::clone(&stores.entities),
            outbox.clone(),
            Arc::clone(&clock),
            offset,
        )));
        job_executor.register(Arc::new(ReminderSweepHandler::new(
            Arc::clone(&stores.entities),
            outbox.clone(),
            Arc::clone(&clock),
            config.scheduler.inactivity_days,
        )));
        job_executor.register(Arc::new(MonthlyReportHandler::new(
            Arc::clone(&stores.entities),
            outbox.clone(),
            Arc::clone(&clock),
            offset,
            config.scheduler.report_window_days,
        )));
        job_executor.register(Arc::new(SearchSyncHandler::new(
            Arc::clone(&stores.entities),
            search_index.clone(),
            Arc::clone(&read_cache),
        )));

        tracing::info!(
            "Job handlers: {}",
            job_executor.registered_types().join(", ")
        );

        let worker_runner = WorkerRunner::new(
            Arc::clone(&job_queue),
            Arc::new(job_executor),
            config.worker.clone(),
        );
        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            worker_runner.run(worker_cancel).await;
        });

        tracing::info!("Background worker started");
        Some(handle)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 6: Scheduler ────────────────────────────────────────
    let scheduler = if config.scheduler.enabled {
        let cadence = Arc::new(
            CadenceScheduler::from_config(job_queue.clone(), &config.scheduler, clock.now())
                .await?,
        );
        let scheduler =
            CronScheduler::new(cadence, Arc::clone(&job_queue), &config.worker).await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    // ── Step 7: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }

    tracing::info!("Waiting for background tasks to complete...");
    if let Some(handle) = worker_handle {
        let _ = tokio::time::timeout(Duration::from_secs(35), handle).await;
    }

    match job_queue.stats().await {
        Ok(stats) => tracing::info!(
            "Queue at shutdown: {} pending, {} running, {} failed",
            stats.pending,
            stats.running,
            stats.failed
        ),
        Err(e) => tracing::warn!("Failed to read queue stats: {}", e),
    }

    tracing::info!("ParkHub shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
