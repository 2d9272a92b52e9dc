//! PostgreSQL Entity Store.
//!
//! Structural changes and spot claims on a lot are serialized by locking
//! the lot row (`SELECT ... FOR UPDATE`); reservation state changes lock
//! the reservation row. Cascades are declared on the foreign keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use parkhub_core::error::{AppError, ErrorKind};
use parkhub_core::result::AppResult;
use parkhub_core::types::id::{LotId, ReservationId, SpotId, UserId};
use parkhub_entity::lot::{Lot, LotSummary};
use parkhub_entity::reservation::{LotUsage, MonthlySpend, Reservation, ReservationDetail};
use parkhub_entity::spot::{Spot, SpotStatus};
use parkhub_entity::user::{User, UserActivity};

use super::{EntityStore, StoreTransaction};

const DETAIL_SELECT: &str = "SELECT r.*, s.lot_id, l.location_name AS lot_name, s.spot_number \
     FROM reservations r \
     JOIN spots s ON s.id = r.spot_id \
     JOIN lots l ON l.id = s.lot_id";

fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        let unique = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
        let kind = if unique {
            ErrorKind::Conflict
        } else {
            ErrorKind::Database
        };
        AppError::with_source(kind, message, e)
    }
}

/// Entity store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    /// Create a new store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find user"))
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find user by username"))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find user by email"))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list users"))
    }

    async fn find_lot(&self, id: LotId) -> AppResult<Option<Lot>> {
        sqlx::query_as::<_, Lot>("SELECT * FROM lots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find lot"))
    }

    async fn list_lots(&self) -> AppResult<Vec<LotSummary>> {
        sqlx::query_as::<_, LotSummary>(
            "SELECT l.*, \
                COUNT(s.id) FILTER (WHERE s.status = 'available') AS available, \
                COUNT(s.id) FILTER (WHERE s.status = 'booked') AS booked, \
                COUNT(s.id) FILTER (WHERE s.status = 'occupied') AS occupied \
             FROM lots l LEFT JOIN spots s ON s.lot_id = l.id \
             GROUP BY l.id \
             ORDER BY l.location_name, l.created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list lots"))
    }

    async fn list_spots(&self, lot_id: LotId) -> AppResult<Vec<Spot>> {
        sqlx::query_as::<_, Spot>("SELECT * FROM spots WHERE lot_id = $1 ORDER BY spot_number")
            .bind(lot_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list spots"))
    }

    async fn find_reservation(&self, id: ReservationId) -> AppResult<Option<ReservationDetail>> {
        sqlx::query_as::<_, ReservationDetail>(&format!("{DETAIL_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find reservation"))
    }

    async fn reservation_history(&self, user_id: UserId) -> AppResult<Vec<ReservationDetail>> {
        sqlx::query_as::<_, ReservationDetail>(&format!(
            "{DETAIL_SELECT} WHERE r.user_id = $1 ORDER BY r.booking_timestamp DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load reservation history"))
    }

    async fn settled_reservations(
        &self,
        user_id: UserId,
        parked_since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ReservationDetail>> {
        sqlx::query_as::<_, ReservationDetail>(&format!(
            "{DETAIL_SELECT} WHERE r.user_id = $1 AND NOT r.is_active \
             AND ($2::timestamptz IS NULL OR r.parking_timestamp >= $2) \
             ORDER BY r.booking_timestamp DESC"
        ))
        .bind(user_id)
        .bind(parked_since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load settled reservations"))
    }

    async fn user_activity(&self) -> AppResult<Vec<UserActivity>> {
        sqlx::query_as::<_, UserActivity>(
            "SELECT u.*, MAX(r.booking_timestamp) AS last_booking \
             FROM users u LEFT JOIN reservations r ON r.user_id = u.id \
             WHERE u.role = 'user' \
             GROUP BY u.id \
             ORDER BY u.username",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to load user activity"))
    }

    async fn lot_usage(&self, user_id: UserId) -> AppResult<Vec<LotUsage>> {
        sqlx::query_as::<_, LotUsage>(
            "SELECT l.location_name AS lot_name, COUNT(r.id) AS reservations \
             FROM reservations r \
             JOIN spots s ON s.id = r.spot_id \
             JOIN lots l ON l.id = s.lot_id \
             WHERE r.user_id = $1 \
             GROUP BY l.location_name \
             ORDER BY l.location_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to aggregate lot usage"))
    }

    async fn spending_by_month(&self, user_id: UserId) -> AppResult<Vec<MonthlySpend>> {
        sqlx::query_as::<_, MonthlySpend>(
            "SELECT to_char(r.parking_timestamp AT TIME ZONE 'UTC', 'YYYY-MM') AS month, \
                    SUM(r.parking_cost) AS total \
             FROM reservations r \
             WHERE r.user_id = $1 \
               AND r.parking_cost IS NOT NULL \
               AND r.parking_timestamp IS NOT NULL \
             GROUP BY month \
             ORDER BY month",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to aggregate spending"))
    }
}

/// An open PostgreSQL transaction.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_lot(&mut self, id: LotId) -> AppResult<Option<Lot>> {
        sqlx::query_as::<_, Lot>("SELECT * FROM lots WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err("Failed to lock lot"))
    }

    async fn insert_lot(&mut self, lot: &Lot) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO lots (id, location_name, address, pincode, price_per_hour, total_spots, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(lot.id)
        .bind(&lot.location_name)
        .bind(&lot.address)
        .bind(&lot.pincode)
        .bind(lot.price_per_hour)
        .bind(lot.total_spots)
        .bind(lot.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to insert lot"))?;
        Ok(())
    }

    async fn update_lot(&mut self, lot: &Lot) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE lots SET location_name = $2, address = $3, pincode = $4, \
             price_per_hour = $5, total_spots = $6 WHERE id = $1",
        )
        .bind(lot.id)
        .bind(&lot.location_name)
        .bind(&lot.address)
        .bind(&lot.pincode)
        .bind(lot.price_per_hour)
        .bind(lot.total_spots)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to update lot"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Lot {} not found", lot.id)));
        }
        Ok(())
    }

    async fn delete_lot(&mut self, id: LotId) -> AppResult<()> {
        sqlx::query("DELETE FROM lots WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to delete lot"))?;
        Ok(())
    }

    async fn spots_in_lot(&mut self, lot_id: LotId) -> AppResult<Vec<Spot>> {
        sqlx::query_as::<_, Spot>(
            "SELECT * FROM spots WHERE lot_id = $1 ORDER BY spot_number FOR UPDATE",
        )
        .bind(lot_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err("Failed to load spots"))
    }

    async fn available_spots(&mut self, lot_id: LotId, limit: i64) -> AppResult<Vec<Spot>> {
        sqlx::query_as::<_, Spot>(
            "SELECT * FROM spots WHERE lot_id = $1 AND status = 'available' \
             ORDER BY spot_number LIMIT $2 FOR UPDATE",
        )
        .bind(lot_id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err("Failed to select available spots"))
    }

    async fn count_available(&mut self, lot_id: LotId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM spots WHERE lot_id = $1 AND status = 'available'",
        )
        .bind(lot_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err("Failed to count available spots"))
    }

    async fn find_spot(&mut self, id: SpotId) -> AppResult<Option<Spot>> {
        sqlx::query_as::<_, Spot>("SELECT * FROM spots WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err("Failed to find spot"))
    }

    async fn insert_spots(&mut self, spots: &[Spot]) -> AppResult<()> {
        if spots.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO spots (id, lot_id, spot_number, status) ");
        builder.push_values(spots, |mut row, spot| {
            row.push_bind(spot.id)
                .push_bind(spot.lot_id)
                .push_bind(spot.spot_number)
                .push_bind(spot.status);
        });
        builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to insert spots"))?;
        Ok(())
    }

    async fn delete_spots(&mut self, ids: &[SpotId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let displaced = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reservations WHERE spot_id = ANY($1) AND is_active",
        )
        .bind(ids)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err("Failed to count displaced reservations"))?;

        sqlx::query("DELETE FROM spots WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to delete spots"))?;

        Ok(displaced.max(0) as u64)
    }

    async fn claim_spot(&mut self, id: SpotId) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE spots SET status = 'booked' WHERE id = $1 AND status = 'available'")
                .bind(id)
                .execute(&mut *self.tx)
                .await
                .map_err(db_err("Failed to claim spot"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_spot_status(&mut self, id: SpotId, status: SpotStatus) -> AppResult<()> {
        sqlx::query("UPDATE spots SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to update spot status"))?;
        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO reservations (id, spot_id, user_id, booking_timestamp, parking_timestamp, \
             leaving_timestamp, parking_cost, is_active) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(reservation.id)
        .bind(reservation.spot_id)
        .bind(reservation.user_id)
        .bind(reservation.booking_timestamp)
        .bind(reservation.parking_timestamp)
        .bind(reservation.leaving_timestamp)
        .bind(reservation.parking_cost)
        .bind(reservation.is_active)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to insert reservation"))?;
        Ok(())
    }

    async fn find_active_reservation(
        &mut self,
        id: ReservationId,
        user_id: UserId,
    ) -> AppResult<Option<Reservation>> {
        sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE id = $1 AND user_id = $2 AND is_active FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err("Failed to find active reservation"))
    }

    async fn active_reservations_for_user(
        &mut self,
        user_id: UserId,
    ) -> AppResult<Vec<Reservation>> {
        sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE user_id = $1 AND is_active FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err("Failed to load active reservations"))
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> AppResult<()> {
        sqlx::query(
            "UPDATE reservations SET parking_timestamp = $2, leaving_timestamp = $3, \
             parking_cost = $4, is_active = $5 WHERE id = $1",
        )
        .bind(reservation.id)
        .bind(reservation.parking_timestamp)
        .bind(reservation.leaving_timestamp)
        .bind(reservation.parking_cost)
        .bind(reservation.is_active)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to update reservation"))?;
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Username or email already registered"))?;
        Ok(())
    }

    async fn delete_user(&mut self, id: UserId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to delete user"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(db_err("Failed to commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(db_err("Failed to roll back transaction"))
    }
}
