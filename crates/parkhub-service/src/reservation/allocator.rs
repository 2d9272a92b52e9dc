//! Spot allocation.

use std::sync::Arc;

use tracing::{info, warn};

use parkhub_cache::ReadCache;
use parkhub_core::config::AllocationConfig;
use parkhub_core::time::Clock;
use parkhub_core::types::id::{LotId, UserId};
use parkhub_database::EntityStore;
use parkhub_entity::reservation::Reservation;

use crate::context::Principal;
use crate::error::{EngineError, EngineResult};
use crate::locks::LotLocks;

/// Finds and claims available spots for a booking request.
#[derive(Debug, Clone)]
pub struct SpotAllocator {
    /// Entity store.
    store: Arc<dyn EntityStore>,
    /// Read cache flushed after every booking.
    cache: Arc<ReadCache>,
    /// Per-lot exclusive sections.
    locks: Arc<LotLocks>,
    /// Time source for booking timestamps.
    clock: Arc<dyn Clock>,
    /// Retry and size limits.
    config: AllocationConfig,
}

impl SpotAllocator {
    /// Creates a new spot allocator.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<ReadCache>,
        locks: Arc<LotLocks>,
        clock: Arc<dyn Clock>,
        config: AllocationConfig,
    ) -> Self {
        Self {
            store,
            cache,
            locks,
            clock,
            config,
        }
    }

    /// Book `requested` spots of a lot for the principal.
    ///
    /// The lowest-numbered available spots are taken. Either every spot is
    /// booked or none is. Returns the reservations in allocation order.
    pub async fn book(
        &self,
        principal: &Principal,
        lot_id: LotId,
        requested: i64,
    ) -> EngineResult<Vec<Reservation>> {
        principal.require_user()?;

        if requested < 1 {
            return Err(EngineError::validation("At least one spot must be requested"));
        }
        if requested > i64::from(self.config.max_spots_per_booking) {
            return Err(EngineError::validation(format!(
                "At most {} spots can be booked at once",
                self.config.max_spots_per_booking
            )));
        }

        let _guard = self.locks.acquire(lot_id).await;

        let mut attempt = 0u32;
        let reservations = loop {
            match self.try_book(principal.user_id, lot_id, requested).await {
                Err(EngineError::ConcurrencyConflict(spot_id))
                    if attempt < self.config.max_claim_retries =>
                {
                    attempt += 1;
                    warn!(%lot_id, %spot_id, attempt, "Spot claim lost a race, retrying");
                }
                Err(EngineError::ConcurrencyConflict(_)) => {
                    let available = self.count_available(lot_id).await?;
                    return Err(EngineError::InsufficientCapacity {
                        requested,
                        available,
                    });
                }
                other => break other?,
            }
        };

        self.cache.invalidate_all().await;

        info!(
            %lot_id,
            user_id = %principal.user_id,
            count = reservations.len(),
            "Spots booked"
        );

        Ok(reservations)
    }

    /// One select-claim-insert pass inside a single transaction.
    async fn try_book(
        &self,
        user_id: UserId,
        lot_id: LotId,
        requested: i64,
    ) -> EngineResult<Vec<Reservation>> {
        let mut tx = self.store.begin().await?;

        if tx.lock_lot(lot_id).await?.is_none() {
            return Err(EngineError::not_found(format!("Lot {lot_id} not found")));
        }

        let candidates = tx.available_spots(lot_id, requested).await?;
        if (candidates.len() as i64) < requested {
            let available = tx.count_available(lot_id).await?;
            tx.rollback().await?;
            return Err(EngineError::InsufficientCapacity {
                requested,
                available,
            });
        }

        let now = self.clock.now();
        let mut reservations = Vec::with_capacity(candidates.len());
        for spot in candidates {
            if !tx.claim_spot(spot.id).await? {
                tx.rollback().await?;
                return Err(EngineError::ConcurrencyConflict(spot.id));
            }
            let reservation = Reservation::book(spot.id, user_id, now);
            tx.insert_reservation(&reservation).await?;
            reservations.push(reservation);
        }

        tx.commit().await?;
        Ok(reservations)
    }

    async fn count_available(&self, lot_id: LotId) -> EngineResult<i64> {
        let mut tx = self.store.begin().await?;
        let available = tx.count_available(lot_id).await?;
        tx.rollback().await?;
        Ok(available)
    }
}
