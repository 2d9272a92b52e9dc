//! The assembled engine handed to a request layer.

use std::sync::Arc;

use parkhub_cache::ReadCache;
use parkhub_core::config::AllocationConfig;
use parkhub_core::time::Clock;
use parkhub_core::traits::search::SearchIndex;
use parkhub_database::EntityStore;

use crate::dispatch::TaskDispatcher;
use crate::locks::LotLocks;
use crate::lot::CapacityManager;
use crate::query::QueryService;
use crate::reservation::{ReservationLifecycle, SpotAllocator};
use crate::user::UserService;

/// Every engine service, wired to one store, cache and lock table.
///
/// All fields are cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Engine {
    /// Books spots.
    pub allocator: SpotAllocator,
    /// Confirms parking and settles reservations.
    pub lifecycle: ReservationLifecycle,
    /// Lot administration.
    pub capacity: CapacityManager,
    /// Cached reads, search and analytics.
    pub query: QueryService,
    /// Account administration.
    pub users: UserService,
    /// The read cache shared by all services.
    pub cache: Arc<ReadCache>,
}

impl Engine {
    /// Wire the services together.
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<ReadCache>,
        dispatcher: Arc<dyn TaskDispatcher>,
        search: Arc<dyn SearchIndex>,
        clock: Arc<dyn Clock>,
        allocation: AllocationConfig,
    ) -> Self {
        let locks = Arc::new(LotLocks::new());
        Self {
            allocator: SpotAllocator::new(
                store.clone(),
                cache.clone(),
                locks.clone(),
                clock.clone(),
                allocation,
            ),
            lifecycle: ReservationLifecycle::new(
                store.clone(),
                cache.clone(),
                locks.clone(),
                clock.clone(),
            ),
            capacity: CapacityManager::new(
                store.clone(),
                cache.clone(),
                dispatcher.clone(),
                locks.clone(),
                clock.clone(),
            ),
            query: QueryService::new(store.clone(), cache.clone(), search),
            users: UserService::new(store, cache.clone(), dispatcher, locks, clock),
            cache,
        }
    }
}
