//! Reservation entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use parkhub_core::types::id::{LotId, ReservationId, SpotId, UserId};

use crate::spot::SpotStatus;

/// The record binding a user to a spot for one booking-to-vacate cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    /// Unique reservation identifier.
    pub id: ReservationId,
    /// Reserved spot.
    pub spot_id: SpotId,
    /// Owning user.
    pub user_id: UserId,
    /// When the booking was made.
    pub booking_timestamp: DateTime<Utc>,
    /// When the user confirmed parking.
    pub parking_timestamp: Option<DateTime<Utc>>,
    /// When the reservation was vacated or cancelled.
    pub leaving_timestamp: Option<DateTime<Utc>>,
    /// Final cost, set once at settlement.
    pub parking_cost: Option<f64>,
    /// True from booking until vacate/cancel.
    pub is_active: bool,
}

impl Reservation {
    /// A new active booking.
    pub fn book(spot_id: SpotId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::new(),
            spot_id,
            user_id,
            booking_timestamp: now,
            parking_timestamp: None,
            leaving_timestamp: None,
            parking_cost: None,
            is_active: true,
        }
    }

    /// Whether a vehicle has been parked.
    pub fn is_parked(&self) -> bool {
        self.parking_timestamp.is_some()
    }

    /// The status the reserved spot must have while this reservation is current.
    pub fn spot_status(&self) -> SpotStatus {
        match (self.is_active, self.is_parked()) {
            (false, _) => SpotStatus::Available,
            (true, false) => SpotStatus::Booked,
            (true, true) => SpotStatus::Occupied,
        }
    }
}

/// A reservation joined with its spot and lot, as shown in history views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReservationDetail {
    /// The reservation row.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Lot owning the spot.
    pub lot_id: LotId,
    /// Lot display name.
    pub lot_name: String,
    /// Spot number within the lot.
    pub spot_number: i32,
}
