//! Spot entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use parkhub_core::types::id::{LotId, SpotId};

use super::status::SpotStatus;

/// One allocatable unit within a lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Spot {
    /// Unique spot identifier.
    pub id: SpotId,
    /// Owning lot.
    pub lot_id: LotId,
    /// Position within the lot, unique per lot, starting at 1.
    pub spot_number: i32,
    /// Current status.
    pub status: SpotStatus,
}

impl Spot {
    /// A fresh available spot.
    pub fn available(lot_id: LotId, spot_number: i32) -> Self {
        Self {
            id: SpotId::new(),
            lot_id,
            spot_number,
            status: SpotStatus::Available,
        }
    }

    /// Spots numbered `from..=to` for a lot, all available.
    pub fn range(lot_id: LotId, from: i32, to: i32) -> Vec<Self> {
        (from..=to).map(|n| Self::available(lot_id, n)).collect()
    }
}
