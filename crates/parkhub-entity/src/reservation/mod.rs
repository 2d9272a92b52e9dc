//! Reservation domain entities.

pub mod model;
pub mod stats;

pub use model::{Reservation, ReservationDetail};
pub use stats::{LotUsage, MonthlySpend};
