//! In-memory Entity Store.
//!
//! Committed state is an immutable snapshot behind an `RwLock`; readers
//! clone the `Arc` and never wait on writers. Writers are serialized by a
//! single async mutex held for the lifetime of a transaction, and work on
//! a private copy that replaces the snapshot on commit.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use parkhub_core::error::AppError;
use parkhub_core::result::AppResult;
use parkhub_core::types::id::{LotId, ReservationId, SpotId, UserId};
use parkhub_entity::lot::{Lot, LotSummary};
use parkhub_entity::reservation::{LotUsage, MonthlySpend, Reservation, ReservationDetail};
use parkhub_entity::spot::{Spot, SpotStatus};
use parkhub_entity::user::{User, UserActivity, UserRole};

use super::{EntityStore, StoreTransaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    lots: HashMap<LotId, Lot>,
    spots: HashMap<SpotId, Spot>,
    reservations: HashMap<ReservationId, Reservation>,
}

impl Tables {
    fn detail(&self, r: &Reservation) -> Option<ReservationDetail> {
        let spot = self.spots.get(&r.spot_id)?;
        let lot = self.lots.get(&spot.lot_id)?;
        Some(ReservationDetail {
            reservation: r.clone(),
            lot_id: lot.id,
            lot_name: lot.location_name.clone(),
            spot_number: spot.spot_number,
        })
    }

    fn details_for_user<F>(&self, user_id: UserId, filter: F) -> Vec<ReservationDetail>
    where
        F: Fn(&Reservation) -> bool,
    {
        let mut rows: Vec<ReservationDetail> = self
            .reservations
            .values()
            .filter(|r| r.user_id == user_id && filter(r))
            .filter_map(|r| self.detail(r))
            .collect();
        rows.sort_by(|a, b| {
            b.reservation
                .booking_timestamp
                .cmp(&a.reservation.booking_timestamp)
        });
        rows
    }

    fn sorted_spots(&self, lot_id: LotId) -> Vec<Spot> {
        let mut spots: Vec<Spot> = self
            .spots
            .values()
            .filter(|s| s.lot_id == lot_id)
            .cloned()
            .collect();
        spots.sort_by_key(|s| s.spot_number);
        spots
    }

    /// Remove spots and cascade to their reservations.
    fn remove_spots(&mut self, ids: &[SpotId]) -> u64 {
        for id in ids {
            self.spots.remove(id);
        }
        let mut displaced = 0;
        self.reservations.retain(|_, r| {
            if ids.contains(&r.spot_id) {
                if r.is_active {
                    displaced += 1;
                }
                false
            } else {
                true
            }
        });
        displaced
    }
}

/// Entity store kept entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEntityStore {
    committed: Arc<RwLock<Arc<Tables>>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Tables> {
        let guard = self.committed.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let working = (*self.snapshot()).clone();
        Ok(Box::new(MemoryTransaction {
            committed: Arc::clone(&self.committed),
            working,
            _writer: writer,
        }))
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.snapshot().users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .snapshot()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .snapshot()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.snapshot().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn find_lot(&self, id: LotId) -> AppResult<Option<Lot>> {
        Ok(self.snapshot().lots.get(&id).cloned())
    }

    async fn list_lots(&self) -> AppResult<Vec<LotSummary>> {
        let tables = self.snapshot();
        let mut summaries: Vec<LotSummary> = tables
            .lots
            .values()
            .map(|lot| {
                let mut summary = LotSummary {
                    lot: lot.clone(),
                    available: 0,
                    booked: 0,
                    occupied: 0,
                };
                for spot in tables.spots.values().filter(|s| s.lot_id == lot.id) {
                    match spot.status {
                        SpotStatus::Available => summary.available += 1,
                        SpotStatus::Booked => summary.booked += 1,
                        SpotStatus::Occupied => summary.occupied += 1,
                    }
                }
                summary
            })
            .collect();
        summaries.sort_by(|a, b| {
            a.lot
                .location_name
                .cmp(&b.lot.location_name)
                .then(a.lot.created_at.cmp(&b.lot.created_at))
        });
        Ok(summaries)
    }

    async fn list_spots(&self, lot_id: LotId) -> AppResult<Vec<Spot>> {
        Ok(self.snapshot().sorted_spots(lot_id))
    }

    async fn find_reservation(&self, id: ReservationId) -> AppResult<Option<ReservationDetail>> {
        let tables = self.snapshot();
        Ok(tables.reservations.get(&id).and_then(|r| tables.detail(r)))
    }

    async fn reservation_history(&self, user_id: UserId) -> AppResult<Vec<ReservationDetail>> {
        Ok(self.snapshot().details_for_user(user_id, |_| true))
    }

    async fn settled_reservations(
        &self,
        user_id: UserId,
        parked_since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ReservationDetail>> {
        Ok(self.snapshot().details_for_user(user_id, |r| {
            !r.is_active
                && match parked_since {
                    Some(since) => r.parking_timestamp.is_some_and(|p| p >= since),
                    None => true,
                }
        }))
    }

    async fn user_activity(&self) -> AppResult<Vec<UserActivity>> {
        let tables = self.snapshot();
        let mut rows: Vec<UserActivity> = tables
            .users
            .values()
            .filter(|u| u.role == UserRole::User)
            .map(|u| UserActivity {
                user: u.clone(),
                last_booking: tables
                    .reservations
                    .values()
                    .filter(|r| r.user_id == u.id)
                    .map(|r| r.booking_timestamp)
                    .max(),
            })
            .collect();
        rows.sort_by(|a, b| a.user.username.cmp(&b.user.username));
        Ok(rows)
    }

    async fn lot_usage(&self, user_id: UserId) -> AppResult<Vec<LotUsage>> {
        let tables = self.snapshot();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for detail in tables.details_for_user(user_id, |_| true) {
            *counts.entry(detail.lot_name).or_insert(0) += 1;
        }
        let mut usage: Vec<LotUsage> = counts
            .into_iter()
            .map(|(lot_name, reservations)| LotUsage {
                lot_name,
                reservations,
            })
            .collect();
        usage.sort_by(|a, b| a.lot_name.cmp(&b.lot_name));
        Ok(usage)
    }

    async fn spending_by_month(&self, user_id: UserId) -> AppResult<Vec<MonthlySpend>> {
        let tables = self.snapshot();
        let mut totals: HashMap<String, f64> = HashMap::new();
        for r in tables.reservations.values().filter(|r| r.user_id == user_id) {
            if let (Some(parked), Some(cost)) = (r.parking_timestamp, r.parking_cost) {
                *totals.entry(parked.format("%Y-%m").to_string()).or_insert(0.0) += cost;
            }
        }
        let mut months: Vec<MonthlySpend> = totals
            .into_iter()
            .map(|(month, total)| MonthlySpend { month, total })
            .collect();
        months.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(months)
    }
}

/// A working copy of the tables holding the store's writer lock.
struct MemoryTransaction {
    committed: Arc<RwLock<Arc<Tables>>>,
    working: Tables,
    _writer: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn spot_mut(&mut self, id: SpotId) -> AppResult<&mut Spot> {
        self.working
            .spots
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Spot {id} not found")))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_lot(&mut self, id: LotId) -> AppResult<Option<Lot>> {
        Ok(self.working.lots.get(&id).cloned())
    }

    async fn insert_lot(&mut self, lot: &Lot) -> AppResult<()> {
        if self.working.lots.contains_key(&lot.id) {
            return Err(AppError::conflict(format!("Lot {} already exists", lot.id)));
        }
        self.working.lots.insert(lot.id, lot.clone());
        Ok(())
    }

    async fn update_lot(&mut self, lot: &Lot) -> AppResult<()> {
        match self.working.lots.get_mut(&lot.id) {
            Some(row) => {
                *row = lot.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Lot {} not found", lot.id))),
        }
    }

    async fn delete_lot(&mut self, id: LotId) -> AppResult<()> {
        let spot_ids: Vec<SpotId> = self
            .working
            .spots
            .values()
            .filter(|s| s.lot_id == id)
            .map(|s| s.id)
            .collect();
        self.working.remove_spots(&spot_ids);
        self.working.lots.remove(&id);
        Ok(())
    }

    async fn spots_in_lot(&mut self, lot_id: LotId) -> AppResult<Vec<Spot>> {
        Ok(self.working.sorted_spots(lot_id))
    }

    async fn available_spots(&mut self, lot_id: LotId, limit: i64) -> AppResult<Vec<Spot>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .working
            .sorted_spots(lot_id)
            .into_iter()
            .filter(|s| s.status == SpotStatus::Available)
            .take(limit)
            .collect())
    }

    async fn count_available(&mut self, lot_id: LotId) -> AppResult<i64> {
        Ok(self
            .working
            .spots
            .values()
            .filter(|s| s.lot_id == lot_id && s.status == SpotStatus::Available)
            .count() as i64)
    }

    async fn find_spot(&mut self, id: SpotId) -> AppResult<Option<Spot>> {
        Ok(self.working.spots.get(&id).cloned())
    }

    async fn insert_spots(&mut self, spots: &[Spot]) -> AppResult<()> {
        for spot in spots {
            let clash = self
                .working
                .spots
                .values()
                .any(|s| s.lot_id == spot.lot_id && s.spot_number == spot.spot_number);
            if clash {
                return Err(AppError::conflict(format!(
                    "Spot number {} already exists in lot {}",
                    spot.spot_number, spot.lot_id
                )));
            }
            self.working.spots.insert(spot.id, spot.clone());
        }
        Ok(())
    }

    async fn delete_spots(&mut self, ids: &[SpotId]) -> AppResult<u64> {
        Ok(self.working.remove_spots(ids))
    }

    async fn claim_spot(&mut self, id: SpotId) -> AppResult<bool> {
        let spot = self.spot_mut(id)?;
        if spot.status != SpotStatus::Available {
            return Ok(false);
        }
        spot.status = SpotStatus::Booked;
        Ok(true)
    }

    async fn set_spot_status(&mut self, id: SpotId, status: SpotStatus) -> AppResult<()> {
        self.spot_mut(id)?.status = status;
        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        if !self.working.spots.contains_key(&reservation.spot_id) {
            return Err(AppError::not_found(format!(
                "Spot {} not found",
                reservation.spot_id
            )));
        }
        if !self.working.users.contains_key(&reservation.user_id) {
            return Err(AppError::not_found(format!(
                "User {} not found",
                reservation.user_id
            )));
        }
        let double_booked = reservation.is_active
            && self
                .working
                .reservations
                .values()
                .any(|r| r.is_active && r.spot_id == reservation.spot_id);
        if double_booked {
            return Err(AppError::conflict(format!(
                "Spot {} already has an active reservation",
                reservation.spot_id
            )));
        }
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn find_active_reservation(
        &mut self,
        id: ReservationId,
        user_id: UserId,
    ) -> AppResult<Option<Reservation>> {
        Ok(self
            .working
            .reservations
            .get(&id)
            .filter(|r| r.user_id == user_id && r.is_active)
            .cloned())
    }

    async fn active_reservations_for_user(
        &mut self,
        user_id: UserId,
    ) -> AppResult<Vec<Reservation>> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| r.user_id == user_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        match self.working.reservations.get_mut(&reservation.id) {
            Some(row) => {
                *row = reservation.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!(
                "Reservation {} not found",
                reservation.id
            ))),
        }
    }

    async fn insert_user(&mut self, user: &User) -> AppResult<()> {
        let duplicate = self
            .working
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if duplicate {
            return Err(AppError::conflict("Username or email already registered"));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&mut self, id: UserId) -> AppResult<bool> {
        let existed = self.working.users.remove(&id).is_some();
        self.working.reservations.retain(|_, r| r.user_id != id);
        Ok(existed)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction {
            committed,
            working,
            _writer,
        } = *self;
        let mut guard = committed.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(working);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
