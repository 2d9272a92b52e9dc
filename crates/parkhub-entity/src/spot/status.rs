//! Spot status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a spot, derived from its active reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "spot_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SpotStatus {
    /// No active reservation.
    Available,
    /// Active reservation, vehicle not yet parked.
    Booked,
    /// Active reservation with a parked vehicle.
    Occupied,
}

impl SpotStatus {
    /// Whether a capacity change may remove a spot in this status.
    ///
    /// Booked spots are removable: a pending booking is displaced. Only
    /// a parked vehicle blocks removal.
    pub fn is_removable(&self) -> bool {
        !matches!(self, Self::Occupied)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Occupied => "occupied",
        }
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
