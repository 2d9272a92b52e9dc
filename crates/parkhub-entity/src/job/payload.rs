//! Typed job payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parkhub_core::traits::search::SearchEntity;
use parkhub_core::types::id::UserId;

use super::status::JobPriority;

/// Every task the worker pool knows how to execute.
///
/// Serialized with the `job_type` tag, so the stored payload is
/// self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum Task {
    /// Broadcast that a new lot opened.
    AnnounceNewLot {
        /// Lot display name.
        lot_name: String,
        /// Lot address.
        address: String,
    },
    /// Export a user's settled reservations as CSV and deliver it.
    ExportHistoryCsv {
        /// Requesting user.
        user_id: UserId,
    },
    /// Remind users who have not booked recently.
    DailyReminderSweep,
    /// Send every non-admin user their monthly report.
    MonthlyReportSweep,
    /// Bring the keyword index in line with one record.
    SyncSearchIndex {
        /// Record family.
        entity: SearchEntity,
        /// Record id.
        id: Uuid,
    },
}

impl Task {
    /// The `job_type` tag of this task.
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::AnnounceNewLot { .. } => "announce_new_lot",
            Self::ExportHistoryCsv { .. } => "export_history_csv",
            Self::DailyReminderSweep => "daily_reminder_sweep",
            Self::MonthlyReportSweep => "monthly_report_sweep",
            Self::SyncSearchIndex { .. } => "sync_search_index",
        }
    }

    /// Queue the task is placed on.
    pub fn queue(&self) -> &'static str {
        match self {
            Self::DailyReminderSweep | Self::MonthlyReportSweep => "scheduled",
            Self::SyncSearchIndex { .. } => "maintenance",
            _ => "default",
        }
    }

    /// Priority within its queue.
    pub fn priority(&self) -> JobPriority {
        match self {
            Self::ExportHistoryCsv { .. } => JobPriority::High,
            Self::SyncSearchIndex { .. } => JobPriority::Low,
            _ => JobPriority::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_carries_job_type_tag() {
        let task = Task::ExportHistoryCsv {
            user_id: UserId::new(),
        };
        let value = serde_json::to_value(&task).expect("serialize");
        assert_eq!(value["job_type"], "export_history_csv");

        let back: Task = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, task);
    }

    #[test]
    fn test_unit_variant_tag() {
        let value = serde_json::to_value(Task::DailyReminderSweep).expect("serialize");
        assert_eq!(value, serde_json::json!({"job_type": "daily_reminder_sweep"}));
        assert_eq!(Task::DailyReminderSweep.queue(), "scheduled");
    }
}
