//! # parkhub-cache
//!
//! Cache provider implementations and the read cache:
//!
//! - **memory**: in-process cache using [moka](https://crates.io/crates/moka)
//! - **redis**: Redis-backed cache using the [redis](https://crates.io/crates/redis) crate
//! - [`ReadCache`]: memoizes read endpoints and is flushed on every write
//!
//! The provider is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
pub mod read_cache;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::CacheManager;
pub use read_cache::{CacheStats, ReadCache};
