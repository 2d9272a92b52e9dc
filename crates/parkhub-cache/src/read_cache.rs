//! Invalidate-on-write memoization of read endpoints.
//!
//! Every entry key carries the current *generation*. A write bumps the
//! generation before purging the namespace, so a computation that started
//! under the old generation can only ever populate a key nobody reads
//! again. Cache failures degrade to a direct computation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use parkhub_core::traits::cache::CacheProvider;

use crate::keys::READ_NAMESPACE;

/// Hit/miss counters of a [`ReadCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that had to be computed.
    pub misses: u64,
    /// Current generation.
    pub generation: u64,
}

/// Read cache over any [`CacheProvider`].
#[derive(Debug)]
pub struct ReadCache {
    provider: Arc<dyn CacheProvider>,
    generation: AtomicU64,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReadCache {
    /// Create a read cache whose entries live for `ttl`.
    pub fn new(provider: Arc<dyn CacheProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            generation: AtomicU64::new(0),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn full_key(&self, generation: u64, key: &str) -> String {
        format!("{READ_NAMESPACE}:{generation}:{key}")
    }

    /// Return the cached value for `key`, or compute and store it.
    ///
    /// Errors from `compute` are returned as-is and never cached.
    pub async fn get_or_compute<T, F, Fut, E>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.generation.load(Ordering::Acquire);
        let full_key = self.full_key(generation, key);

        match self.provider.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %full_key, "Read cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %full_key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %full_key, error = %e, "Read cache lookup failed"),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.provider.set(&full_key, &raw, self.ttl).await {
                    warn!(key = %full_key, error = %e, "Read cache store failed");
                }
            }
            Err(e) => warn!(key = %full_key, error = %e, "Failed to encode read result"),
        }

        Ok(value)
    }

    /// Make every existing entry unreachable and purge the namespace.
    pub async fn invalidate_all(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let pattern = format!("{READ_NAMESPACE}:*");
        match self.provider.delete_pattern(&pattern).await {
            Ok(count) => debug!(generation, count, "Read cache invalidated"),
            Err(e) => warn!(generation, error = %e, "Read cache purge failed"),
        }
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            generation: self.generation(),
        }
    }
}
