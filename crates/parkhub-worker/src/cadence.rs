//! Wall-clock cadences and the scheduler that fires them.
//!
//! [`Cadence::next_after`] is pure; [`CadenceScheduler::fire_due`] takes
//! the current instant as an argument. Both can be exercised without
//! waiting for real time to pass.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use parkhub_core::config::SchedulerConfig;
use parkhub_core::error::AppError;
use parkhub_core::result::AppResult;
use parkhub_entity::job::Task;
use parkhub_service::TaskDispatcher;

/// When a periodic task fires, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum Cadence {
    /// Every day at `hour:minute`.
    Daily {
        /// Hour of day, 0-23.
        hour: u32,
        /// Minute, 0-59.
        minute: u32,
    },
    /// Every month on `day` at `hour:minute`. Days past the end of a
    /// month fire on its last day.
    Monthly {
        /// Day of month, 1-31.
        day: u32,
        /// Hour of day, 0-23.
        hour: u32,
        /// Minute, 0-59.
        minute: u32,
    },
}

impl Cadence {
    /// Reject out-of-range fields.
    pub fn validate(&self) -> AppResult<()> {
        let (day, hour, minute) = match *self {
            Self::Daily { hour, minute } => (1, hour, minute),
            Self::Monthly { day, hour, minute } => (day, hour, minute),
        };
        if !(1..=31).contains(&day) || hour > 23 || minute > 59 {
            return Err(AppError::configuration(format!("Invalid cadence: {self:?}")));
        }
        Ok(())
    }

    /// The first fire instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&offset).naive_local();

        let candidate = match *self {
            Self::Daily { hour, minute } => {
                let today = local.date().and_hms_opt(hour, minute, 0)?;
                if today > local {
                    today
                } else {
                    today.checked_add_signed(Duration::days(1))?
                }
            }
            Self::Monthly { day, hour, minute } => {
                let first_of_month = local.date().with_day(1)?;
                let this_month = monthly_fire(first_of_month, day, hour, minute)?;
                if this_month > local {
                    this_month
                } else {
                    let next_month = first_of_month.checked_add_months(Months::new(1))?;
                    monthly_fire(next_month, day, hour, minute)?
                }
            }
        };

        offset
            .from_local_datetime(&candidate)
            .single()
            .map(|t| t.with_timezone(&Utc))
    }
}

fn monthly_fire(first_of_month: NaiveDate, day: u32, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    let last_day = first_of_month
        .checked_add_months(Months::new(1))?
        .pred_opt()?
        .day();
    first_of_month
        .with_day(day.min(last_day))?
        .and_hms_opt(hour, minute, 0)
}

/// The configured local offset.
pub fn local_offset(config: &SchedulerConfig) -> AppResult<FixedOffset> {
    FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
        AppError::configuration(format!(
            "UTC offset of {} minutes is out of range",
            config.utc_offset_minutes
        ))
    })
}

#[derive(Debug)]
struct Entry {
    name: String,
    cadence: Cadence,
    task: Task,
    next_fire: DateTime<Utc>,
}

/// Enqueues tasks when their cadence comes due.
#[derive(Debug)]
pub struct CadenceScheduler {
    dispatcher: Arc<dyn TaskDispatcher>,
    offset: FixedOffset,
    entries: Mutex<Vec<Entry>>,
}

impl CadenceScheduler {
    /// Create a scheduler with no entries.
    pub fn new(dispatcher: Arc<dyn TaskDispatcher>, offset: FixedOffset) -> Self {
        Self {
            dispatcher,
            offset,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// A scheduler with the daily reminder and monthly report sweeps.
    pub async fn from_config(
        dispatcher: Arc<dyn TaskDispatcher>,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let scheduler = Self::new(dispatcher, local_offset(config)?);
        scheduler
            .register(
                "daily_reminder_sweep",
                Cadence::Daily {
                    hour: config.daily_reminder_hour,
                    minute: config.daily_reminder_minute,
                },
                Task::DailyReminderSweep,
                now,
            )
            .await?;
        scheduler
            .register(
                "monthly_report_sweep",
                Cadence::Monthly {
                    day: config.monthly_report_day,
                    hour: config.monthly_report_hour,
                    minute: config.monthly_report_minute,
                },
                Task::MonthlyReportSweep,
                now,
            )
            .await?;
        Ok(scheduler)
    }

    /// Register a periodic task. Its first fire is the first cadence
    /// instant after `now`.
    pub async fn register(
        &self,
        name: &str,
        cadence: Cadence,
        task: Task,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        cadence.validate()?;
        let next_fire = cadence.next_after(now, self.offset).ok_or_else(|| {
            AppError::configuration(format!("Cadence of '{name}' never fires"))
        })?;

        info!(name, ?cadence, %next_fire, "Registered periodic task");
        self.entries.lock().await.push(Entry {
            name: name.to_string(),
            cadence,
            task,
            next_fire,
        });
        Ok(())
    }

    /// Enqueue every task whose fire time is at or before `now`.
    ///
    /// A task fires at most once per call even if several of its fire
    /// times were missed. When the enqueue fails the task stays due and
    /// is tried again on the next call. Returns the names that fired.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut fired = Vec::new();
        let mut entries = self.entries.lock().await;

        for entry in entries.iter_mut().filter(|e| e.next_fire <= now) {
            match self.dispatcher.enqueue(entry.task.clone()).await {
                Ok(job_id) => {
                    info!(name = %entry.name, %job_id, "Periodic task enqueued");
                    match entry.cadence.next_after(now, self.offset) {
                        Some(next) => entry.next_fire = next,
                        None => error!(name = %entry.name, "Cadence has no next fire time"),
                    }
                    fired.push(entry.name.clone());
                }
                Err(e) => {
                    error!(name = %entry.name, error = %e, "Failed to enqueue periodic task");
                }
            }
        }

        fired
    }

    /// Next fire instant of a registered task.
    pub async fn next_fire(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.next_fire)
    }
}
