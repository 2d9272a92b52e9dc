//! New-lot announcement job.

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use parkhub_entity::job::{Job, Task};

use super::{delivery_failure, unexpected_payload};
use crate::delivery::Outbox;
use crate::executor::{JobExecutionError, JobHandler, parse_task};

/// Posts a line to the broadcast channel when a lot opens
#[derive(Debug)]
pub struct AnnounceJobHandler {
    outbox: Outbox,
}

impl AnnounceJobHandler {
    /// Create a new announcement handler
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl JobHandler for AnnounceJobHandler {
    fn job_type(&self) -> &str {
        "announce_new_lot"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let (lot_name, address) = match parse_task(job)? {
            Task::AnnounceNewLot { lot_name, address } => (lot_name, address),
            other => return Err(unexpected_payload(job, &other)),
        };

        let text = format!("New parking lot available: {lot_name} at {address}");
        self.outbox
            .post_to_channel(text)
            .await
            .map_err(delivery_failure)?;

        tracing::info!("Announced new lot '{}'", lot_name);
        Ok(Some(serde_json::json!({
            "task": "announce_new_lot",
            "lot_name": lot_name,
        })))
    }
}
