//! Read endpoints served through the [`ReadCache`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parkhub_cache::{ReadCache, keys};
use parkhub_core::traits::search::{SearchEntity, SearchIndex};
use parkhub_core::types::id::{LotId, UserId};
use parkhub_database::EntityStore;
use parkhub_entity::lot::{Lot, LotSummary};
use parkhub_entity::reservation::{LotUsage, MonthlySpend, ReservationDetail};
use parkhub_entity::spot::Spot;
use parkhub_entity::user::UserView;

use crate::error::{EngineError, EngineResult};

/// A lot with every one of its spots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotDetail {
    /// The lot row.
    pub lot: Lot,
    /// Spots ordered by number.
    pub spots: Vec<Spot>,
}

/// Per-user aggregates for charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnalytics {
    /// Reservations per lot.
    pub lot_usage: Vec<LotUsage>,
    /// Settled spending per `YYYY-MM`.
    pub monthly_spending: Vec<MonthlySpend>,
}

/// Cached listings, details, search and analytics.
#[derive(Debug, Clone)]
pub struct QueryService {
    store: Arc<dyn EntityStore>,
    cache: Arc<ReadCache>,
    search: Arc<dyn SearchIndex>,
}

impl QueryService {
    /// Creates a new query service.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<ReadCache>,
        search: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            store,
            cache,
            search,
        }
    }

    /// Every lot with live available, booked and occupied counts.
    pub async fn list_lots(&self) -> EngineResult<Vec<LotSummary>> {
        Ok(self
            .cache
            .get_or_compute(&keys::lot_list(), || self.store.list_lots())
            .await?)
    }

    /// One lot with its spots.
    pub async fn lot_detail(&self, lot_id: LotId) -> EngineResult<LotDetail> {
        let detail: Option<LotDetail> = self
            .cache
            .get_or_compute(&keys::lot_detail(lot_id.into_uuid()), || async {
                match self.store.find_lot(lot_id).await? {
                    Some(lot) => {
                        let spots = self.store.list_spots(lot_id).await?;
                        Ok::<_, EngineError>(Some(LotDetail { lot, spots }))
                    }
                    None => Ok(None),
                }
            })
            .await?;

        detail.ok_or_else(|| EngineError::not_found(format!("Lot {lot_id} not found")))
    }

    /// Every user ordered by username.
    pub async fn list_users(&self) -> EngineResult<Vec<UserView>> {
        self.cache
            .get_or_compute(&keys::user_list(), || async {
                let users = self.store.list_users().await?;
                Ok::<_, EngineError>(users.into_iter().map(UserView::from).collect())
            })
            .await
    }

    /// A user's reservations, newest booking first.
    pub async fn user_reservations(&self, user_id: UserId) -> EngineResult<Vec<ReservationDetail>> {
        Ok(self
            .cache
            .get_or_compute(&keys::user_reservations(user_id.into_uuid()), || {
                self.store.reservation_history(user_id)
            })
            .await?)
    }

    /// Lot usage and monthly spending of a user.
    pub async fn user_analytics(&self, user_id: UserId) -> EngineResult<UserAnalytics> {
        self.cache
            .get_or_compute(&keys::user_analytics(user_id.into_uuid()), || async {
                Ok::<_, EngineError>(UserAnalytics {
                    lot_usage: self.store.lot_usage(user_id).await?,
                    monthly_spending: self.store.spending_by_month(user_id).await?,
                })
            })
            .await
    }

    /// Lots matching a keyword query, in index order.
    ///
    /// An empty query returns the full listing.
    pub async fn search_lots(&self, query: &str) -> EngineResult<Vec<LotSummary>> {
        if query.trim().is_empty() {
            return self.list_lots().await;
        }
        self.cache
            .get_or_compute(&keys::lot_search(query), || async {
                let ids = self.search.search(SearchEntity::Lot, query).await?;
                let lots = self.store.list_lots().await?;
                Ok::<_, EngineError>(order_by_ids(&ids, lots, |l| l.lot.id.into_uuid()))
            })
            .await
    }

    /// Users matching a keyword query, in index order.
    ///
    /// An empty query returns the full listing.
    pub async fn search_users(&self, query: &str) -> EngineResult<Vec<UserView>> {
        if query.trim().is_empty() {
            return self.list_users().await;
        }
        self.cache
            .get_or_compute(&keys::user_search(query), || async {
                let ids = self.search.search(SearchEntity::User, query).await?;
                let users = self.store.list_users().await?;
                let users = order_by_ids(&ids, users, |u| u.id.into_uuid());
                Ok::<_, EngineError>(users.into_iter().map(UserView::from).collect())
            })
            .await
    }
}

/// Keep the records named in `ids`, in that order. Ids the store no
/// longer knows are skipped.
fn order_by_ids<T>(ids: &[Uuid], records: Vec<T>, id_of: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut by_id: HashMap<Uuid, T> = records.into_iter().map(|r| (id_of(&r), r)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
