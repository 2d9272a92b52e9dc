//! In-process keyword index.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use parkhub_core::result::AppResult;
use parkhub_core::traits::search::{SearchEntity, SearchIndex};
use parkhub_database::EntityStore;

/// Case-insensitive keyword index held in memory.
///
/// A record matches when every query term occurs in one of its fields.
/// Records with more whole-word hits rank first; ties are ordered by
/// their first field.
#[derive(Debug, Default)]
pub struct KeywordIndex {
    docs: DashMap<(SearchEntity, Uuid), Vec<String>>,
}

impl KeywordIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed records of one family.
    pub fn count(&self, entity: SearchEntity) -> usize {
        self.docs.iter().filter(|e| e.key().0 == entity).count()
    }
}

fn score(fields: &[String], terms: &[String]) -> Option<usize> {
    let mut total = 0;
    for term in terms {
        if !fields.iter().any(|f| f.contains(term.as_str())) {
            return None;
        }
        total += fields
            .iter()
            .filter(|f| f.split_whitespace().any(|word| word == term))
            .count();
    }
    Some(total)
}

#[async_trait]
impl SearchIndex for KeywordIndex {
    async fn index(&self, entity: SearchEntity, id: Uuid, fields: Vec<String>) -> AppResult<()> {
        let fields = fields.into_iter().map(|f| f.to_lowercase()).collect();
        self.docs.insert((entity, id), fields);
        Ok(())
    }

    async fn remove(&self, entity: SearchEntity, id: Uuid) -> AppResult<()> {
        self.docs.remove(&(entity, id));
        Ok(())
    }

    async fn search(&self, entity: SearchEntity, query: &str) -> AppResult<Vec<Uuid>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

        let mut hits: Vec<(usize, String, Uuid)> = self
            .docs
            .iter()
            .filter(|e| e.key().0 == entity)
            .filter_map(|e| {
                let fields = e.value();
                score(fields, &terms).map(|s| (s, fields.first().cloned().unwrap_or_default(), e.key().1))
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
        Ok(hits.into_iter().map(|(_, _, id)| id).collect())
    }
}

/// Index every lot and user currently in the store.
///
/// Returns the number of lots and users indexed.
pub async fn rebuild_index(
    store: &dyn EntityStore,
    index: &dyn SearchIndex,
) -> AppResult<(usize, usize)> {
    let lots = store.list_lots().await?;
    for summary in &lots {
        index
            .index(
                SearchEntity::Lot,
                summary.lot.id.into_uuid(),
                summary.lot.search_fields(),
            )
            .await?;
    }

    let users = store.list_users().await?;
    for user in &users {
        index
            .index(SearchEntity::User, user.id.into_uuid(), user.search_fields())
            .await?;
    }

    info!(lots = lots.len(), users = users.len(), "Search index rebuilt");
    Ok((lots.len(), users.len()))
}
