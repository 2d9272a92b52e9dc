//! Daily inactivity reminder sweep.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;
use tracing;

use parkhub_core::time::Clock;
use parkhub_database::EntityStore;
use parkhub_entity::job::{Job, Task};

use super::unexpected_payload;
use crate::delivery::Outbox;
use crate::executor::{JobExecutionError, JobHandler, parse_task};

const SUBJECT: &str = "A Friendly Reminder from ParkHub";

/// Reminds users who have not booked for a while
#[derive(Debug)]
pub struct ReminderSweepHandler {
    /// Entity store
    store: Arc<dyn EntityStore>,
    /// Outbound notifications
    outbox: Outbox,
    /// Time source
    clock: Arc<dyn Clock>,
    /// Users idle for longer than this are reminded
    inactivity_days: i64,
}

impl ReminderSweepHandler {
    /// Create a new reminder sweep handler
    pub fn new(
        store: Arc<dyn EntityStore>,
        outbox: Outbox,
        clock: Arc<dyn Clock>,
        inactivity_days: i64,
    ) -> Self {
        Self {
            store,
            outbox,
            clock,
            inactivity_days,
        }
    }
}

#[async_trait]
impl JobHandler for ReminderSweepHandler {
    fn job_type(&self) -> &str {
        "daily_reminder_sweep"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        match parse_task(job)? {
            Task::DailyReminderSweep => {}
            other => return Err(unexpected_payload(job, &other)),
        }

        let cutoff = self.clock.now() - Duration::days(self.inactivity_days);
        let inactive: Vec<_> = self
            .store
            .user_activity()
            .await?
            .into_iter()
            .filter(|a| a.is_inactive_since(cutoff))
            .collect();

        tracing::info!(
            "Reminder sweep: {} users inactive for {}+ days",
            inactive.len(),
            self.inactivity_days
        );

        let mut sent = 0usize;
        let mut failed = 0usize;
        for activity in &inactive {
            let user = &activity.user;
            let body = format!(
                "Hi {}, It's been a while since your last booking. Don't forget to reserve a spot on ParkHub if you need one!",
                user.username
            );
            match self.outbox.send_to_user(user, SUBJECT, body, Vec::new()).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Failed to send reminder to '{}': {}", user.username, e);
                }
            }
        }

        let summary = if inactive.is_empty() {
            "No inactive users found".to_string()
        } else {
            format!("Sent reminders to {}/{} inactive users", sent, inactive.len())
        };
        if let Err(e) = self.outbox.post_to_channel(summary.clone()).await {
            tracing::warn!("Failed to post reminder summary: {}", e);
        }
        tracing::info!("{}", summary);

        Ok(Some(serde_json::json!({
            "task": "daily_reminder_sweep",
            "inactive": inactive.len(),
            "sent": sent,
            "failed": failed,
        })))
    }
}
