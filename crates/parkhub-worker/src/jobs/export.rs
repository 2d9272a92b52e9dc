//! Parking history CSV export job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::FixedOffset;
use serde_json::Value;
use tracing;

use parkhub_core::time::Clock;
use parkhub_database::EntityStore;
use parkhub_entity::job::{Job, Task};

use super::{delivery_failure, unexpected_payload};
use crate::delivery::{Attachment, Outbox};
use crate::executor::{JobExecutionError, JobHandler, parse_task};
use crate::render::history_csv;

/// Exports a user's settled reservations and mails them as CSV
#[derive(Debug)]
pub struct ExportJobHandler {
    /// Entity store
    store: Arc<dyn EntityStore>,
    /// Outbound notifications
    outbox: Outbox,
    /// Time source for the file name
    clock: Arc<dyn Clock>,
    /// Offset timestamps are rendered in
    offset: FixedOffset,
}

impl ExportJobHandler {
    /// Create a new export handler
    pub fn new(
        store: Arc<dyn EntityStore>,
        outbox: Outbox,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            outbox,
            clock,
            offset,
        }
    }
}

#[async_trait]
impl JobHandler for ExportJobHandler {
    fn job_type(&self) -> &str {
        "export_history_csv"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let user_id = match parse_task(job)? {
            Task::ExportHistoryCsv { user_id } => user_id,
            other => return Err(unexpected_payload(job, &other)),
        };

        let Some(user) = self.store.find_user(user_id).await? else {
            tracing::warn!("Export requested for unknown user {}", user_id);
            return Ok(Some(serde_json::json!({
                "task": "export_history_csv",
                "exported": 0,
                "skipped": "user_not_found",
            })));
        };

        let rows = self.store.settled_reservations(user_id, None).await?;
        if rows.is_empty() {
            tracing::info!("No parking history to export for '{}'", user.username);
            return Ok(Some(serde_json::json!({
                "task": "export_history_csv",
                "exported": 0,
            })));
        }

        let csv = history_csv(&rows, self.offset);
        let date = self.clock.now().with_timezone(&self.offset).format("%Y%m%d");
        let attachment = Attachment {
            file_name: format!("{}_parking_history_{}.csv", user.username, date),
            content_type: "text/csv".to_string(),
            bytes: csv.into_bytes(),
        };
        let file_name = attachment.file_name.clone();

        self.outbox
            .send_to_user(
                &user,
                "Your ParkHub History Export",
                format!(
                    "Hi {}, Attached is your parking history export as requested.",
                    user.username
                ),
                vec![attachment],
            )
            .await
            .map_err(delivery_failure)?;

        let notice = format!(
            "Hi {}, your CSV export is complete and has been sent to your email: {}.",
            user.username, user.email
        );
        if let Err(e) = self.outbox.post_to_channel(notice).await {
            tracing::warn!("Failed to post export completion for '{}': {}", user.username, e);
        }

        tracing::info!(
            "Exported {} reservations for '{}' as {}",
            rows.len(),
            user.username,
            file_name
        );
        Ok(Some(serde_json::json!({
            "task": "export_history_csv",
            "exported": rows.len(),
            "file_name": file_name,
        })))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use parkhub_core::time::ManualClock;
    use parkhub_entity::user::UserRole;

    use super::*;
    use crate::jobs::testing::{
        RecordingNotifier, ist, job_for, lot, outbox, settled, store, t0, user,
    };
    use crate::render::CSV_HEADER;

    fn handler(
        store: Arc<parkhub_database::MemoryEntityStore>,
        notifier: &Arc<RecordingNotifier>,
    ) -> ExportJobHandler {
        ExportJobHandler::new(store, outbox(notifier), Arc::new(ManualClock::new(t0())), ist())
    }

    #[tokio::test]
    async fn test_no_history_is_a_no_op() {
        let store = store();
        let alice = user(&store, "alice", UserRole::User).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let result = handler(store, &notifier)
            .execute(&job_for(&Task::ExportHistoryCsv { user_id: alice.id }))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result["exported"], 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_export_rows_and_delivery() {
        let store = store();
        let alice = user(&store, "alice", UserRole::User).await;
        let (_, spots) = lot(&store, "Central Plaza", 2).await;
        settled(&store, &spots[0], &alice, t0() - Duration::days(3), true, 20.0).await;
        settled(&store, &spots[1], &alice, t0() - Duration::days(1), false, 0.0).await;
        let notifier = Arc::new(RecordingNotifier::default());

        let result = handler(store, &notifier)
            .execute(&job_for(&Task::ExportHistoryCsv { user_id: alice.id }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["exported"], 2);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Your ParkHub History Export");
        let attachment = &sent[0].attachments[0];
        assert_eq!(attachment.file_name, "alice_parking_history_20240601.csv");

        let csv = String::from_utf8(attachment.bytes.clone()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 3);
        // Newest booking first; never parked renders N/A.
        assert_eq!(
            lines[1],
            "Central Plaza,2,2024-05-31 14:30:00,N/A,2024-05-31 15:35:00,0.00"
        );
        assert_eq!(
            lines[2],
            "Central Plaza,1,2024-05-29 14:30:00,2024-05-29 14:35:00,2024-05-29 15:35:00,20.00"
        );

        assert_eq!(
            sent[1].body,
            "Hi alice, your CSV export is complete and has been sent to your email: alice@example.com."
        );
    }

    #[tokio::test]
    async fn test_unreachable_mailbox_is_transient() {
        let store = store();
        let alice = user(&store, "alice", UserRole::User).await;
        let (_, spots) = lot(&store, "Central Plaza", 1).await;
        settled(&store, &spots[0], &alice, t0() - Duration::days(3), true, 20.0).await;
        let notifier = Arc::new(RecordingNotifier::failing_for(&["alice@example.com"]));

        let err = handler(store, &notifier)
            .execute(&job_for(&Task::ExportHistoryCsv { user_id: alice.id }))
            .await
            .unwrap_err();

        assert!(matches!(err, JobExecutionError::Transient(_)));
        assert!(notifier.sent().is_empty());
    }
}
