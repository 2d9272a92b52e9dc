//! Engine, worker and scheduler tests over the in-memory stores.

mod helpers;

mod allocation_test;
mod cache_test;
mod capacity_test;
mod lifecycle_test;
mod pipeline_test;
