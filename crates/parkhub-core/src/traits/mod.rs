//! Core traits defined in `parkhub-core` and implemented by other crates.

pub mod cache;
pub mod search;

pub use cache::CacheProvider;
pub use search::{SearchEntity, SearchIndex};
