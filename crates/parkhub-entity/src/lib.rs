//! # parkhub-entity
//!
//! Domain entity models for ParkHub. Every struct in this crate is a
//! database row or a domain value object. Row types additionally derive
//! `sqlx::FromRow`; status enums map onto PostgreSQL enum types.

pub mod job;
pub mod lot;
pub mod reservation;
pub mod spot;
pub mod user;
