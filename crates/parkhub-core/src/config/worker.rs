//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of concurrent job processing tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval in seconds between job queue polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Attempts allowed per job before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Base delay before a transiently failed job becomes eligible again.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: u64,
    /// Running jobs older than this are assumed orphaned and re-queued.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    /// Completed and failed jobs are deleted this many days after finishing.
    #[serde(default = "default_retention_days")]
    pub job_retention_days: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            max_attempts: default_max_attempts(),
            retry_backoff_seconds: default_retry_backoff(),
            stale_after_seconds: default_stale_after(),
            job_retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_attempts() -> i32 {
    3
}

fn default_retry_backoff() -> u64 {
    30
}

fn default_stale_after() -> u64 {
    600
}

fn default_retention_days() -> u32 {
    7
}
