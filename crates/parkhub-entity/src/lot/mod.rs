//! Parking lot domain entities.

pub mod model;

pub use model::{Lot, LotMeta, LotSummary, LotUpdate};
