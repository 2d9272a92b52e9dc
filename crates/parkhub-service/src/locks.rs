//! Per-lot exclusive sections.
//!
//! Booking, parking, vacating, resizing and deleting all take the lock of
//! the lot they touch before opening their transaction, so a capacity
//! check can never be invalidated by a claim on the same lot.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use parkhub_core::types::id::LotId;

/// Registry of one async mutex per lot.
#[derive(Debug, Default)]
pub struct LotLocks {
    locks: DashMap<LotId, Arc<Mutex<()>>>,
}

impl LotLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `lot_id`.
    pub async fn acquire(&self, lot_id: LotId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(lot_id).or_default().value());
        lock.lock_owned().await
    }

    /// Acquire several lots in a deadlock-free order.
    pub async fn acquire_many(&self, mut lot_ids: Vec<LotId>) -> Vec<OwnedMutexGuard<()>> {
        lot_ids.sort();
        lot_ids.dedup();
        let mut guards = Vec::with_capacity(lot_ids.len());
        for lot_id in lot_ids {
            guards.push(self.acquire(lot_id).await);
        }
        guards
    }

    /// Drop the entry of a deleted lot.
    pub fn forget(&self, lot_id: LotId) {
        self.locks.remove(&lot_id);
    }

    /// Number of lots with a registered lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock is registered.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_lot_is_exclusive() {
        let locks = Arc::new(LotLocks::new());
        let lot = LotId::new();

        let guard = locks.acquire(lot).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(lot).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_lots_do_not_block() {
        let locks = LotLocks::new();
        let _a = locks.acquire(LotId::new()).await;
        let _b = locks.acquire(LotId::new()).await;
        assert_eq!(locks.len(), 2);
    }
}
