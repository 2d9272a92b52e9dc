//! Monthly activity report sweep.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, FixedOffset};
use serde_json::Value;
use tracing;

use parkhub_core::time::Clock;
use parkhub_database::EntityStore;
use parkhub_entity::job::{Job, Task};
use parkhub_entity::user::User;

use super::unexpected_payload;
use crate::delivery::{Attachment, DeliveryError, Outbox};
use crate::executor::{JobExecutionError, JobHandler, parse_task};
use crate::render::{MonthlySummary, monthly_report_html};

const SUBJECT: &str = "Your ParkHub Monthly Report";

/// Sends every non-admin user a summary of their recent parking
#[derive(Debug)]
pub struct MonthlyReportHandler {
    /// Entity store
    store: Arc<dyn EntityStore>,
    /// Outbound notifications
    outbox: Outbox,
    /// Time source
    clock: Arc<dyn Clock>,
    /// Offset used for the report's month label
    offset: FixedOffset,
    /// Days of history covered by a report
    window_days: i64,
}

/// Why one user's report was not delivered.
#[derive(Debug, thiserror::Error)]
enum ReportError {
    #[error("{0}")]
    Store(#[from] parkhub_core::error::AppError),
    #[error("{0}")]
    Delivery(#[from] DeliveryError),
}

impl MonthlyReportHandler {
    /// Create a new monthly report handler
    pub fn new(
        store: Arc<dyn EntityStore>,
        outbox: Outbox,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        window_days: i64,
    ) -> Self {
        Self {
            store,
            outbox,
            clock,
            offset,
            window_days,
        }
    }

    async fn report_for(&self, user: &User, month: &str) -> Result<(), ReportError> {
        let since = self.clock.now() - Duration::days(self.window_days);
        let rows = self.store.settled_reservations(user.id, Some(since)).await?;
        let summary = MonthlySummary::from_reservations(&rows);
        let html = monthly_report_html(&user.username, &summary, self.window_days);

        let attachment = Attachment {
            file_name: format!("{}_report_{}.html", user.username, month),
            content_type: "text/html".to_string(),
            bytes: html.into_bytes(),
        };
        self.outbox
            .send_to_user(
                user,
                SUBJECT,
                format!(
                    "Hi {}, Please find attached your monthly parking report.",
                    user.username
                ),
                vec![attachment],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for MonthlyReportHandler {
    fn job_type(&self) -> &str {
        "monthly_report_sweep"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        match parse_task(job)? {
            Task::MonthlyReportSweep => {}
            other => return Err(unexpected_payload(job, &other)),
        }

        let users: Vec<User> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| !u.is_admin())
            .collect();
        let month = self
            .clock
            .now()
            .with_timezone(&self.offset)
            .format("%Y_%m")
            .to_string();

        tracing::info!("Monthly report sweep for {} users", users.len());

        let mut sent = 0usize;
        for user in &users {
            match self.report_for(user, &month).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!("Failed to send monthly report to '{}': {}", user.username, e)
                }
            }
        }

        let summary = format!("Processed and sent reports for {}/{} users", sent, users.len());
        if let Err(e) = self.outbox.post_to_channel(summary.clone()).await {
            tracing::warn!("Failed to post report summary: {}", e);
        }
        tracing::info!("{}", summary);

        Ok(Some(serde_json::json!({
            "task": "monthly_report_sweep",
            "users": users.len(),
            "sent": sent,
            "failed": users.len() - sent,
        })))
    }
}

#[cfg(test)]
mod tests {
    use parkhub_core::time::ManualClock;
    use parkhub_entity::user::UserRole;

    use super::*;
    use crate::jobs::testing::{
        RecordingNotifier, ist, job_for, lot, outbox, settled, store, t0, user,
    };

    #[tokio::test]
    async fn test_reports_cover_window_and_tolerate_failures() {
        let store = store();
        let (_, plaza) = lot(&store, "Central Plaza", 1).await;
        let (_, mall) = lot(&store, "Forum Mall", 1).await;
        user(&store, "root", UserRole::Admin).await;
        let alice = user(&store, "alice", UserRole::User).await;
        user(&store, "bob", UserRole::User).await;

        settled(&store, &mall[0], &alice, t0() - Duration::days(5), true, 40.0).await;
        settled(&store, &plaza[0], &alice, t0() - Duration::days(4), true, 20.0).await;
        settled(&store, &plaza[0], &alice, t0() - Duration::days(3), true, 25.5).await;
        // Outside the window.
        settled(&store, &mall[0], &alice, t0() - Duration::days(45), true, 99.0).await;
        // Cancelled before parking.
        settled(&store, &mall[0], &alice, t0() - Duration::days(2), false, 0.0).await;
        let notifier = Arc::new(RecordingNotifier::failing_for(&["bob@example.com"]));

        let handler = MonthlyReportHandler::new(
            store,
            outbox(&notifier),
            Arc::new(ManualClock::new(t0())),
            ist(),
            30,
        );
        let result = handler
            .execute(&job_for(&Task::MonthlyReportSweep))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result["users"], 2);
        assert_eq!(result["sent"], 1);
        assert_eq!(result["failed"], 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, SUBJECT);
        let attachment = &sent[0].attachments[0];
        assert_eq!(attachment.file_name, "alice_report_2024_06.html");
        let html = String::from_utf8(attachment.bytes.clone()).unwrap();
        assert!(html.contains("<b>Total Spots Booked:</b> 3"));
        assert!(html.contains("&#8377;85.50"));
        assert!(html.contains("<b>Most Used Parking Lot:</b> Central Plaza"));

        assert_eq!(sent[1].body, "Processed and sent reports for 1/2 users");
    }
}
