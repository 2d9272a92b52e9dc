//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use parkhub_cache::ReadCache;
use parkhub_cache::memory::MemoryCacheProvider;
use parkhub_core::config::AllocationConfig;
use parkhub_core::config::cache::MemoryCacheConfig;
use parkhub_core::result::AppResult;
use parkhub_core::time::{Clock, ManualClock};
use parkhub_core::types::id::{JobId, UserId};
use parkhub_database::{EntityStore, MemoryEntityStore};
use parkhub_entity::job::Task;
use parkhub_entity::lot::{Lot, LotMeta};
use parkhub_entity::user::{User, UserRole};

use crate::context::Principal;
use crate::dispatch::TaskDispatcher;
use crate::locks::LotLocks;
use crate::lot::CapacityManager;
use crate::query::QueryService;
use crate::reservation::{ReservationLifecycle, SpotAllocator};
use crate::search::KeywordIndex;
use crate::user::UserService;

/// Remembers every enqueued task.
#[derive(Debug, Default)]
pub(crate) struct RecordingDispatcher {
    tasks: Mutex<Vec<Task>>,
}

impl RecordingDispatcher {
    pub(crate) fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskDispatcher for RecordingDispatcher {
    async fn enqueue(&self, task: Task) -> AppResult<JobId> {
        self.tasks.lock().unwrap().push(task);
        Ok(JobId::new())
    }
}

pub(crate) fn meta(name: &str) -> LotMeta {
    LotMeta {
        location_name: name.to_string(),
        address: "12 MG Road".to_string(),
        pincode: "560001".to_string(),
    }
}

pub(crate) struct Harness {
    pub store: Arc<dyn EntityStore>,
    pub cache: Arc<ReadCache>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub locks: Arc<LotLocks>,
    pub clock: Arc<ManualClock>,
    pub search: Arc<KeywordIndex>,
    pub admin: Principal,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let provider = MemoryCacheProvider::new(&MemoryCacheConfig::default(), 60);
        Self {
            store: Arc::new(MemoryEntityStore::new()),
            cache: Arc::new(ReadCache::new(
                Arc::new(provider),
                std::time::Duration::from_secs(60),
            )),
            dispatcher: Arc::new(RecordingDispatcher::default()),
            locks: Arc::new(LotLocks::new()),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            )),
            search: Arc::new(KeywordIndex::new()),
            admin: Principal::admin(UserId::new()),
        }
    }

    pub(crate) fn allocator(&self) -> SpotAllocator {
        SpotAllocator::new(
            self.store.clone(),
            self.cache.clone(),
            self.locks.clone(),
            self.clock.clone(),
            AllocationConfig::default(),
        )
    }

    pub(crate) fn lifecycle(&self) -> ReservationLifecycle {
        ReservationLifecycle::new(
            self.store.clone(),
            self.cache.clone(),
            self.locks.clone(),
            self.clock.clone(),
        )
    }

    pub(crate) fn capacity(&self) -> CapacityManager {
        CapacityManager::new(
            self.store.clone(),
            self.cache.clone(),
            self.dispatcher.clone(),
            self.locks.clone(),
            self.clock.clone(),
        )
    }

    pub(crate) fn users(&self) -> UserService {
        UserService::new(
            self.store.clone(),
            self.cache.clone(),
            self.dispatcher.clone(),
            self.locks.clone(),
            self.clock.clone(),
        )
    }

    pub(crate) fn query(&self) -> QueryService {
        QueryService::new(self.store.clone(), self.cache.clone(), self.search.clone())
    }

    /// Insert a user row directly, skipping password hashing.
    pub(crate) async fn user(&self, username: &str) -> Principal {
        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            role: UserRole::User,
            created_at: self.clock.now(),
        };
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        Principal::from(&user)
    }

    pub(crate) async fn lot(&self, spots: i32, price: f64) -> Lot {
        self.capacity()
            .create_lot(&self.admin, meta("Central Plaza"), spots, price)
            .await
            .unwrap()
    }
}
