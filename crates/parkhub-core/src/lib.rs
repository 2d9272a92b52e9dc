//! # parkhub-core
//!
//! Core crate for ParkHub. Contains the configuration schema, typed
//! identifiers, the clock abstraction, the cache and search traits,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other ParkHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod time;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
