//! Lot creation, resizing, updating and deletion.
//!
//! Spots are created and destroyed only here. Occupied spots are never
//! destroyed; Booked spots may be displaced by a shrink, which cascades
//! to their reservations.

use std::sync::Arc;

use tracing::{info, warn};

use parkhub_cache::ReadCache;
use parkhub_core::time::Clock;
use parkhub_core::traits::search::SearchEntity;
use parkhub_core::types::id::LotId;
use parkhub_database::{EntityStore, StoreTransaction};
use parkhub_entity::job::Task;
use parkhub_entity::lot::{Lot, LotMeta, LotUpdate};
use parkhub_entity::spot::{Spot, SpotStatus};

use crate::context::Principal;
use crate::dispatch::{TaskDispatcher, dispatch_after_commit};
use crate::error::{EngineError, EngineResult};
use crate::locks::LotLocks;

/// Owns the spot pool of every lot.
#[derive(Debug, Clone)]
pub struct CapacityManager {
    /// Entity store.
    store: Arc<dyn EntityStore>,
    /// Read cache flushed after every change.
    cache: Arc<ReadCache>,
    /// Follow-up announcements and index syncs.
    dispatcher: Arc<dyn TaskDispatcher>,
    /// Per-lot exclusive sections.
    locks: Arc<LotLocks>,
    /// Time source.
    clock: Arc<dyn Clock>,
}

impl CapacityManager {
    /// Creates a new capacity manager.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<ReadCache>,
        dispatcher: Arc<dyn TaskDispatcher>,
        locks: Arc<LotLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            dispatcher,
            locks,
            clock,
        }
    }

    /// Create a lot with spots numbered `1..=total_spots`, all Available.
    pub async fn create_lot(
        &self,
        principal: &Principal,
        meta: LotMeta,
        total_spots: i32,
        price_per_hour: f64,
    ) -> EngineResult<Lot> {
        principal.require_admin()?;
        meta.validate().map_err(EngineError::Validation)?;
        if total_spots <= 0 {
            return Err(EngineError::validation("Total spots must be positive"));
        }
        validate_price(price_per_hour)?;

        let lot = Lot::new(meta, price_per_hour, total_spots, self.clock.now());

        let mut tx = self.store.begin().await?;
        tx.insert_lot(&lot).await?;
        tx.insert_spots(&Spot::range(lot.id, 1, total_spots)).await?;
        tx.commit().await?;

        self.cache.invalidate_all().await;
        info!(lot_id = %lot.id, name = %lot.location_name, total_spots, "Lot created");

        dispatch_after_commit(
            self.dispatcher.as_ref(),
            Task::AnnounceNewLot {
                lot_name: lot.location_name.clone(),
                address: lot.address.clone(),
            },
        )
        .await;
        self.sync_index(lot.id).await;

        Ok(lot)
    }

    /// Change the number of spots of a lot.
    pub async fn resize_lot(
        &self,
        principal: &Principal,
        lot_id: LotId,
        new_total: i32,
    ) -> EngineResult<Lot> {
        self.update_lot(
            principal,
            lot_id,
            LotUpdate {
                total_spots: Some(new_total),
                ..LotUpdate::default()
            },
        )
        .await
    }

    /// Apply metadata, price and capacity changes in one transaction.
    pub async fn update_lot(
        &self,
        principal: &Principal,
        lot_id: LotId,
        update: LotUpdate,
    ) -> EngineResult<Lot> {
        principal.require_admin()?;
        if let Some(meta) = &update.meta {
            meta.validate().map_err(EngineError::Validation)?;
        }
        if let Some(price) = update.price_per_hour {
            validate_price(price)?;
        }
        if let Some(total) = update.total_spots
            && total < 0
        {
            return Err(EngineError::validation("Total spots cannot be negative"));
        }

        let _guard = self.locks.acquire(lot_id).await;

        let mut tx = self.store.begin().await?;
        let mut lot = tx
            .lock_lot(lot_id)
            .await?
            .ok_or_else(|| lot_not_found(lot_id))?;

        if let Some(meta) = update.meta {
            lot.location_name = meta.location_name;
            lot.address = meta.address;
            lot.pincode = meta.pincode;
        }
        if let Some(price) = update.price_per_hour {
            lot.price_per_hour = price;
        }
        if let Some(total) = update.total_spots {
            apply_resize(tx.as_mut(), &mut lot, total).await?;
        }

        tx.update_lot(&lot).await?;
        tx.commit().await?;

        self.cache.invalidate_all().await;
        info!(%lot_id, total_spots = lot.total_spots, "Lot updated");
        self.sync_index(lot_id).await;

        Ok(lot)
    }

    /// Delete a lot with all of its spots.
    ///
    /// Rejected while any spot is Occupied.
    pub async fn delete_lot(&self, principal: &Principal, lot_id: LotId) -> EngineResult<()> {
        principal.require_admin()?;
        let guard = self.locks.acquire(lot_id).await;

        let mut tx = self.store.begin().await?;
        if tx.lock_lot(lot_id).await?.is_none() {
            return Err(lot_not_found(lot_id));
        }

        let spots = tx.spots_in_lot(lot_id).await?;
        if let Some(spot) = first_occupied(&spots) {
            tx.rollback().await?;
            return Err(EngineError::CapacityConflict {
                spot_number: spot.spot_number,
            });
        }

        tx.delete_lot(lot_id).await?;
        tx.commit().await?;

        drop(guard);
        self.locks.forget(lot_id);
        self.cache.invalidate_all().await;
        info!(%lot_id, spots = spots.len(), "Lot deleted");
        self.sync_index(lot_id).await;

        Ok(())
    }

    async fn sync_index(&self, lot_id: LotId) {
        dispatch_after_commit(
            self.dispatcher.as_ref(),
            Task::SyncSearchIndex {
                entity: SearchEntity::Lot,
                id: lot_id.into_uuid(),
            },
        )
        .await;
    }
}

/// Grow or shrink the spot pool of `lot` to `new_total`.
///
/// Shrinking removes the highest-numbered spots and fails without any
/// change if one of them is Occupied.
async fn apply_resize(
    tx: &mut dyn StoreTransaction,
    lot: &mut Lot,
    new_total: i32,
) -> EngineResult<()> {
    let spots = tx.spots_in_lot(lot.id).await?;
    let current = spots.len() as i32;

    if new_total > current {
        let highest = spots.last().map_or(0, |s| s.spot_number);
        let added = Spot::range(lot.id, highest + 1, highest + (new_total - current));
        tx.insert_spots(&added).await?;
    } else if new_total < current {
        let candidates = &spots[new_total as usize..];
        if let Some(spot) = first_occupied(candidates) {
            return Err(EngineError::CapacityConflict {
                spot_number: spot.spot_number,
            });
        }

        let ids: Vec<_> = candidates.iter().map(|s| s.id).collect();
        let displaced = tx.delete_spots(&ids).await?;
        if displaced > 0 {
            warn!(
                lot_id = %lot.id,
                displaced,
                "Shrink displaced active bookings"
            );
        }
    }

    lot.total_spots = new_total;
    Ok(())
}

fn first_occupied(spots: &[Spot]) -> Option<&Spot> {
    spots.iter().find(|s| s.status == SpotStatus::Occupied)
}

fn validate_price(price: f64) -> EngineResult<()> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(EngineError::validation("Price per hour must be positive"))
    }
}

fn lot_not_found(lot_id: LotId) -> EngineError {
    EngineError::not_found(format!("Lot {lot_id} not found"))
}
