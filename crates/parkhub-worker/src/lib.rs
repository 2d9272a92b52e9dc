//! Background job processing and scheduled sweeps for ParkHub.
//!
//! This crate provides:
//! - A persistent job queue that implements the engine's task dispatcher
//! - A worker runner that polls for and executes queued jobs with bounded retry
//! - A cadence scheduler (pure next-fire computation) driven by a cron tick
//! - The notification seam with retrying delivery
//! - Job handlers for announcements, exports, reminders, reports and search sync

pub mod cadence;
pub mod delivery;
pub mod executor;
pub mod jobs;
pub mod queue;
pub mod render;
pub mod retry;
pub mod runner;
pub mod scheduler;

pub use cadence::{Cadence, CadenceScheduler};
pub use delivery::{Attachment, DeliveryError, LogNotifier, Message, Notifier, Outbox, Recipient};
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::{JobQueue, QueueStats};
pub use runner::{JobOutcome, WorkerRunner, process_job};
pub use scheduler::CronScheduler;
