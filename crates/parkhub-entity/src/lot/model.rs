//! Lot entity model and metadata validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use parkhub_core::types::id::LotId;

/// A named collection of spots sharing one hourly price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lot {
    /// Unique lot identifier.
    pub id: LotId,
    /// Display name of the location.
    pub location_name: String,
    /// Street address.
    pub address: String,
    /// Six-digit postal code.
    pub pincode: String,
    /// Price per started hour, always positive.
    pub price_per_hour: f64,
    /// Declared capacity; always equals the number of owned spots.
    pub total_spots: i32,
    /// When the lot was created.
    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// Build a new lot row from validated metadata.
    pub fn new(meta: LotMeta, price_per_hour: f64, total_spots: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: LotId::new(),
            location_name: meta.location_name,
            address: meta.address,
            pincode: meta.pincode,
            price_per_hour,
            total_spots,
            created_at: now,
        }
    }

    /// The metadata portion of the lot.
    pub fn meta(&self) -> LotMeta {
        LotMeta {
            location_name: self.location_name.clone(),
            address: self.address.clone(),
            pincode: self.pincode.clone(),
        }
    }

    /// Fields indexed for keyword search.
    pub fn search_fields(&self) -> Vec<String> {
        vec![
            self.location_name.clone(),
            self.address.clone(),
            self.pincode.clone(),
        ]
    }
}

/// Descriptive lot metadata supplied by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotMeta {
    /// Display name of the location.
    pub location_name: String,
    /// Street address.
    pub address: String,
    /// Six-digit postal code.
    pub pincode: String,
}

impl LotMeta {
    /// Check required fields. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.location_name.trim().is_empty() {
            return Err("Location name is required".to_string());
        }
        if self.address.trim().is_empty() {
            return Err("Address is required".to_string());
        }
        if self.pincode.len() != 6 || !self.pincode.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!(
                "Pincode must be exactly 6 digits, got '{}'",
                self.pincode
            ));
        }
        Ok(())
    }
}

/// Partial update of a lot. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LotUpdate {
    /// Replacement metadata.
    pub meta: Option<LotMeta>,
    /// New hourly price.
    pub price_per_hour: Option<f64>,
    /// New capacity; applied with the resize rules.
    pub total_spots: Option<i32>,
}

/// A lot with live spot counts, as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LotSummary {
    /// The lot row.
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lot: Lot,
    /// Spots with no active reservation.
    pub available: i64,
    /// Spots reserved but not yet parked in.
    pub booked: i64,
    /// Spots with a parked vehicle.
    pub occupied: i64,
}
