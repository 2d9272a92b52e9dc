//! Lot administration.

pub mod capacity;

pub use capacity::CapacityManager;
