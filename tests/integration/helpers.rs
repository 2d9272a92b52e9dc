//! Shared test helpers for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use parkhub_cache::ReadCache;
use parkhub_cache::memory::MemoryCacheProvider;
use parkhub_core::config::cache::MemoryCacheConfig;
use parkhub_core::config::{AllocationConfig, WorkerConfig};
use parkhub_core::time::{Clock, ManualClock};
use parkhub_core::types::id::{LotId, UserId};
use parkhub_database::{EntityStore, JobStore, MemoryEntityStore, MemoryJobStore};
use parkhub_entity::lot::{Lot, LotMeta};
use parkhub_entity::spot::Spot;
use parkhub_entity::user::{User, UserRole};
use parkhub_service::{Engine, KeywordIndex, Principal};
use parkhub_worker::jobs::{
    AnnounceJobHandler, ExportJobHandler, MonthlyReportHandler, ReminderSweepHandler,
    SearchSyncHandler,
};
use parkhub_worker::retry::RetryPolicy;
use parkhub_worker::{
    DeliveryError, JobExecutor, JobQueue, Message, Notifier, Outbox, WorkerRunner,
};

/// Keeps delivered messages; listed mailboxes are unreachable.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Message>>,
    unreachable: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Every message delivered so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    /// Make a mailbox fail every delivery.
    pub fn break_mailbox(&self, email: &str) {
        self.unreachable.lock().unwrap().push(email.to_string());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        let recipient = message.recipient.to_string();
        if self.unreachable.lock().unwrap().contains(&recipient) {
            return Err(DeliveryError::Unavailable {
                recipient,
                reason: "connection refused".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Test application context
pub struct TestApp {
    /// The engine under test
    pub engine: Engine,
    /// Entity store behind the engine
    pub store: Arc<dyn EntityStore>,
    /// Job queue the engine dispatches into
    pub queue: Arc<JobQueue>,
    /// Worker draining the queue
    pub runner: WorkerRunner,
    /// Shared manual clock
    pub clock: Arc<ManualClock>,
    /// Outbound messages
    pub notifier: Arc<RecordingNotifier>,
    /// An admin principal
    pub admin: Principal,
}

impl TestApp {
    /// Create a new test application
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let store: Arc<dyn EntityStore> = Arc::new(MemoryEntityStore::new());
        let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let cache = Arc::new(ReadCache::new(
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default(), 60)),
            Duration::from_secs(60),
        ));
        let search = Arc::new(KeywordIndex::new());
        let queue = Arc::new(JobQueue::new(jobs, clock.clone(), "worker-test".into(), 3));

        let engine = Engine::new(
            store.clone(),
            cache.clone(),
            queue.clone(),
            search.clone(),
            clock.clone(),
            AllocationConfig::default(),
        );

        let notifier = Arc::new(RecordingNotifier::default());
        let outbox = Outbox::with_policy(notifier.clone(), RetryPolicy::immediate(2), "ops".into());
        let offset = chrono::FixedOffset::east_opt(330 * 60).unwrap();
        let clock_dyn: Arc<dyn Clock> = clock.clone();

        let mut executor = JobExecutor::new();
        executor.register(Arc::new(AnnounceJobHandler::new(outbox.clone())));
        executor.register(Arc::new(ExportJobHandler::new(
            store.clone(),
            outbox.clone(),
            clock_dyn.clone(),
            offset,
        )));
        executor.register(Arc::new(ReminderSweepHandler::new(
            store.clone(),
            outbox.clone(),
            clock_dyn.clone(),
            7,
        )));
        executor.register(Arc::new(MonthlyReportHandler::new(
            store.clone(),
            outbox,
            clock_dyn,
            offset,
            30,
        )));
        executor.register(Arc::new(SearchSyncHandler::new(
            store.clone(),
            search,
            cache,
        )));

        let runner = WorkerRunner::new(
            queue.clone(),
            Arc::new(executor),
            WorkerConfig {
                retry_backoff_seconds: 10,
                ..WorkerConfig::default()
            },
        );

        Self {
            engine,
            store,
            queue,
            runner,
            clock,
            notifier,
            admin: Principal::admin(UserId::new()),
        }
    }

    /// Insert a user row directly, skipping password hashing.
    pub async fn user(&self, username: &str) -> (User, Principal) {
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
        let principal = Principal::from(&user);
        (user, principal)
    }

    /// Create a lot through the engine.
    pub async fn lot(&self, name: &str, spots: i32, price: f64) -> Lot {
        self.engine
            .capacity
            .create_lot(&self.admin, meta(name), spots, price)
            .await
            .unwrap()
    }

    /// Spots of a lot, ordered by number.
    pub async fn spots(&self, lot_id: LotId) -> Vec<Spot> {
        self.store.list_spots(lot_id).await.unwrap()
    }

    /// Check that the lot's declared capacity matches its spot rows.
    pub async fn assert_capacity_consistent(&self, lot_id: LotId) {
        let lot = self.store.find_lot(lot_id).await.unwrap().unwrap();
        let spots = self.spots(lot_id).await;
        assert_eq!(lot.total_spots as usize, spots.len());
        let numbers: Vec<i32> = spots.iter().map(|s| s.spot_number).collect();
        assert_eq!(numbers, (1..=lot.total_spots).collect::<Vec<_>>());
    }

    /// Advance the clock by whole minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(chrono::Duration::minutes(minutes));
    }
}

/// Valid lot metadata.
pub fn meta(name: &str) -> LotMeta {
    LotMeta {
        location_name: name.to_string(),
        address: "12 MG Road".to_string(),
        pincode: "560001".to_string(),
    }
}
