//! Spot domain entities.

pub mod model;
pub mod status;

pub use model::Spot;
pub use status::SpotStatus;
