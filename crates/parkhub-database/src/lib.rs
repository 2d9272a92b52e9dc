//! # parkhub-database
//!
//! The transactional Entity Store (users, lots, spots, reservations) and
//! the persistent job store, each with a PostgreSQL implementation and an
//! in-memory implementation for tests and single-node use.

pub mod jobs;
pub mod migration;
pub mod store;
pub mod stores;

pub use jobs::{JobStore, MemoryJobStore, PgJobStore};
pub use store::{EntityStore, MemoryEntityStore, PgEntityStore, StoreTransaction};
pub use stores::Stores;
