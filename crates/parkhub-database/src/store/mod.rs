//! The Entity Store seam.
//!
//! [`EntityStore`] exposes committed reads plus [`EntityStore::begin`],
//! which opens a [`StoreTransaction`]. Every write goes through a
//! transaction; dropping a transaction without committing rolls it back.
//!
//! Cascade rules (enforced by both backends):
//! - deleting a lot deletes its spots;
//! - deleting a spot deletes its reservations;
//! - deleting a user deletes its reservations.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parkhub_core::result::AppResult;
use parkhub_core::types::id::{LotId, ReservationId, SpotId, UserId};
use parkhub_entity::lot::{Lot, LotSummary};
use parkhub_entity::reservation::{LotUsage, MonthlySpend, Reservation, ReservationDetail};
use parkhub_entity::spot::{Spot, SpotStatus};
use parkhub_entity::user::{User, UserActivity};

pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;

/// Transactional access to users, lots, spots and reservations.
#[async_trait]
pub trait EntityStore: Send + Sync + std::fmt::Debug + 'static {
    /// Open a transaction.
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;

    /// Find a user by id.
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Find a user by username.
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Find a user by email.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// All users ordered by username.
    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Find a lot by id.
    async fn find_lot(&self, id: LotId) -> AppResult<Option<Lot>>;

    /// All lots with live spot counts, ordered by name.
    async fn list_lots(&self) -> AppResult<Vec<LotSummary>>;

    /// Spots of a lot ordered by spot number.
    async fn list_spots(&self, lot_id: LotId) -> AppResult<Vec<Spot>>;

    /// A reservation joined with its spot and lot.
    async fn find_reservation(&self, id: ReservationId) -> AppResult<Option<ReservationDetail>>;

    /// All of a user's reservations, newest booking first.
    async fn reservation_history(&self, user_id: UserId) -> AppResult<Vec<ReservationDetail>>;

    /// A user's settled reservations, newest booking first.
    ///
    /// With `parked_since`, only reservations whose `parking_timestamp`
    /// is at or after that instant are returned.
    async fn settled_reservations(
        &self,
        user_id: UserId,
        parked_since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ReservationDetail>>;

    /// Every non-admin user with their latest booking time.
    async fn user_activity(&self) -> AppResult<Vec<UserActivity>>;

    /// Reservation counts per lot for a user, ordered by lot name.
    async fn lot_usage(&self, user_id: UserId) -> AppResult<Vec<LotUsage>>;

    /// Settled spending per parking month for a user, oldest month first.
    async fn spending_by_month(&self, user_id: UserId) -> AppResult<Vec<MonthlySpend>>;
}

/// One all-or-nothing unit of work.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read a lot and hold it exclusively until the transaction ends.
    async fn lock_lot(&mut self, id: LotId) -> AppResult<Option<Lot>>;

    /// Insert a lot row.
    async fn insert_lot(&mut self, lot: &Lot) -> AppResult<()>;

    /// Overwrite a lot row.
    async fn update_lot(&mut self, lot: &Lot) -> AppResult<()>;

    /// Delete a lot with its spots and their reservations.
    async fn delete_lot(&mut self, id: LotId) -> AppResult<()>;

    /// All spots of a lot ordered by spot number.
    async fn spots_in_lot(&mut self, lot_id: LotId) -> AppResult<Vec<Spot>>;

    /// Up to `limit` available spots of a lot, lowest number first.
    async fn available_spots(&mut self, lot_id: LotId, limit: i64) -> AppResult<Vec<Spot>>;

    /// Number of available spots in a lot.
    async fn count_available(&mut self, lot_id: LotId) -> AppResult<i64>;

    /// Find a spot by id.
    async fn find_spot(&mut self, id: SpotId) -> AppResult<Option<Spot>>;

    /// Insert spot rows.
    async fn insert_spots(&mut self, spots: &[Spot]) -> AppResult<()>;

    /// Delete spots and their reservations.
    ///
    /// Returns the number of *active* reservations that were removed.
    async fn delete_spots(&mut self, ids: &[SpotId]) -> AppResult<u64>;

    /// Atomically move a spot from Available to Booked.
    ///
    /// Returns `false` when the spot is no longer available.
    async fn claim_spot(&mut self, id: SpotId) -> AppResult<bool>;

    /// Set a spot's status unconditionally.
    async fn set_spot_status(&mut self, id: SpotId, status: SpotStatus) -> AppResult<()>;

    /// Insert a reservation row.
    async fn insert_reservation(&mut self, reservation: &Reservation) -> AppResult<()>;

    /// The active reservation `id` owned by `user_id`, held exclusively.
    async fn find_active_reservation(
        &mut self,
        id: ReservationId,
        user_id: UserId,
    ) -> AppResult<Option<Reservation>>;

    /// All active reservations of a user.
    async fn active_reservations_for_user(&mut self, user_id: UserId)
    -> AppResult<Vec<Reservation>>;

    /// Overwrite a reservation row.
    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<()>;

    /// Insert a user row. Duplicate username or email is a conflict.
    async fn insert_user(&mut self, user: &User) -> AppResult<()>;

    /// Delete a user and their reservations. Returns whether the user existed.
    async fn delete_user(&mut self, id: UserId) -> AppResult<bool>;

    /// Make every change visible atomically.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discard every change.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
