//! Reservation state machine: Booked, then Occupied, then settled.
//!
//! A reservation that is vacated before park confirmation is cancelled
//! at zero cost. Cost is computed exactly once, when the reservation
//! becomes inactive.

use std::sync::Arc;

use tracing::info;

use parkhub_cache::ReadCache;
use parkhub_core::time::Clock;
use parkhub_core::types::id::{LotId, ReservationId};
use parkhub_database::EntityStore;
use parkhub_entity::reservation::Reservation;
use parkhub_entity::spot::SpotStatus;

use super::cost::compute_cost;
use crate::context::Principal;
use crate::error::{EngineError, EngineResult};
use crate::locks::LotLocks;

/// Drives single reservations through park and vacate.
#[derive(Debug, Clone)]
pub struct ReservationLifecycle {
    store: Arc<dyn EntityStore>,
    cache: Arc<ReadCache>,
    locks: Arc<LotLocks>,
    clock: Arc<dyn Clock>,
}

impl ReservationLifecycle {
    /// Creates a new lifecycle service.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<ReadCache>,
        locks: Arc<LotLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            cache,
            locks,
            clock,
        }
    }

    /// Confirm the vehicle is parked: the spot becomes Occupied.
    pub async fn confirm_park(
        &self,
        principal: &Principal,
        reservation_id: ReservationId,
    ) -> EngineResult<Reservation> {
        principal.require_user()?;
        let lot_id = self.owning_lot(principal, reservation_id).await?;
        let _guard = self.locks.acquire(lot_id).await;

        let mut tx = self.store.begin().await?;
        let mut reservation = tx
            .find_active_reservation(reservation_id, principal.user_id)
            .await?
            .ok_or_else(|| not_found(reservation_id))?;

        if reservation.is_parked() {
            tx.rollback().await?;
            return Err(EngineError::AlreadyParked(reservation_id));
        }

        reservation.parking_timestamp = Some(self.clock.now());
        tx.update_reservation(&reservation).await?;
        tx.set_spot_status(reservation.spot_id, SpotStatus::Occupied)
            .await?;
        tx.commit().await?;

        self.cache.invalidate_all().await;
        info!(%reservation_id, %lot_id, "Parking confirmed");

        Ok(reservation)
    }

    /// Release the spot and settle the reservation.
    ///
    /// A parked reservation is billed with [`compute_cost`]; one that was
    /// never parked is a cancellation and costs nothing.
    pub async fn vacate(
        &self,
        principal: &Principal,
        reservation_id: ReservationId,
    ) -> EngineResult<Reservation> {
        principal.require_user()?;
        let lot_id = self.owning_lot(principal, reservation_id).await?;
        let _guard = self.locks.acquire(lot_id).await;

        let mut tx = self.store.begin().await?;
        let mut reservation = tx
            .find_active_reservation(reservation_id, principal.user_id)
            .await?
            .ok_or_else(|| not_found(reservation_id))?;
        let lot = tx
            .lock_lot(lot_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("Lot {lot_id} not found")))?;

        let now = self.clock.now();
        let cost = match reservation.parking_timestamp {
            Some(parked_at) => compute_cost(parked_at, now, lot.price_per_hour),
            None => 0.0,
        };

        reservation.leaving_timestamp = Some(now);
        reservation.parking_cost = Some(cost);
        reservation.is_active = false;

        tx.update_reservation(&reservation).await?;
        tx.set_spot_status(reservation.spot_id, SpotStatus::Available)
            .await?;
        tx.commit().await?;

        self.cache.invalidate_all().await;
        info!(%reservation_id, %lot_id, cost, "Reservation settled");

        Ok(reservation)
    }

    /// The lot of an active reservation owned by the principal.
    async fn owning_lot(
        &self,
        principal: &Principal,
        reservation_id: ReservationId,
    ) -> EngineResult<LotId> {
        self.store
            .find_reservation(reservation_id)
            .await?
            .filter(|d| d.reservation.user_id == principal.user_id && d.reservation.is_active)
            .map(|d| d.lot_id)
            .ok_or_else(|| not_found(reservation_id))
    }
}

fn not_found(reservation_id: ReservationId) -> EngineError {
    EngineError::not_found(format!("No active reservation {reservation_id}"))
}
