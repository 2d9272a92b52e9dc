//! Aggregates over a user's reservations.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How often a user reserved in one lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LotUsage {
    /// Lot display name.
    pub lot_name: String,
    /// Number of reservations.
    pub reservations: i64,
}

/// Settled spending for one calendar month (`YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MonthlySpend {
    /// Month key, `YYYY-MM`.
    pub month: String,
    /// Sum of parking costs.
    pub total: f64,
}
