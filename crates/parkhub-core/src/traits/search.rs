//! Keyword search collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::AppResult;

/// The record families that are kept in the keyword index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchEntity {
    /// Parking lots (name, address, pincode).
    Lot,
    /// Users (username, email).
    User,
}

/// A keyword index over lot and user records.
///
/// The index is eventually consistent with the entity store: it is
/// updated by the `sync_search_index` job after every create, update
/// or delete of a lot or user.
#[async_trait]
pub trait SearchIndex: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace the searchable fields of a record.
    async fn index(&self, entity: SearchEntity, id: Uuid, fields: Vec<String>) -> AppResult<()>;

    /// Remove a record. Removing an unknown record is not an error.
    async fn remove(&self, entity: SearchEntity, id: Uuid) -> AppResult<()>;

    /// Ids of records matching every term of `query`, best match first.
    async fn search(&self, entity: SearchEntity, query: &str) -> AppResult<Vec<Uuid>>;
}
