//! Keyword index synchronisation job.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use parkhub_cache::ReadCache;
use parkhub_core::traits::search::{SearchEntity, SearchIndex};
use parkhub_core::types::id::{LotId, UserId};
use parkhub_database::EntityStore;
use parkhub_entity::job::{Job, Task};

use super::unexpected_payload;
use crate::executor::{JobExecutionError, JobHandler, parse_task};

/// Re-reads one lot or user and updates the keyword index to match.
///
/// Cached search results are computed from the index, so the read cache
/// is cleared once the index changes.
#[derive(Debug)]
pub struct SearchSyncHandler {
    store: Arc<dyn EntityStore>,
    index: Arc<dyn SearchIndex>,
    cache: Arc<ReadCache>,
}

impl SearchSyncHandler {
    /// Create a new search sync handler
    pub fn new(
        store: Arc<dyn EntityStore>,
        index: Arc<dyn SearchIndex>,
        cache: Arc<ReadCache>,
    ) -> Self {
        Self {
            store,
            index,
            cache,
        }
    }
}

#[async_trait]
impl JobHandler for SearchSyncHandler {
    fn job_type(&self) -> &str {
        "sync_search_index"
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let (entity, id) = match parse_task(job)? {
            Task::SyncSearchIndex { entity, id } => (entity, id),
            other => return Err(unexpected_payload(job, &other)),
        };

        let fields = match entity {
            SearchEntity::Lot => self
                .store
                .find_lot(LotId::from_uuid(id))
                .await?
                .map(|lot| lot.search_fields()),
            SearchEntity::User => self
                .store
                .find_user(UserId::from_uuid(id))
                .await?
                .map(|user| user.search_fields()),
        };

        let action = match fields {
            Some(fields) => {
                self.index.index(entity, id, fields).await?;
                "indexed"
            }
            None => {
                self.index.remove(entity, id).await?;
                "removed"
            }
        };
        self.cache.invalidate_all().await;

        tracing::debug!("Search index {} {:?} {}", action, entity, id);
        Ok(Some(serde_json::json!({
            "task": "sync_search_index",
            "id": id,
            "action": action,
        })))
    }
}
