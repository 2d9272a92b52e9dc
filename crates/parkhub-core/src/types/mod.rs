//! Core type definitions used across the ParkHub workspace.

pub mod id;
pub mod money;

pub use id::*;
pub use money::round_cents;
