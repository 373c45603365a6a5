// FILE: src/core/cache.rs
//! Bounded TTL cache for provider results.
//!
//! Expiry is checked lazily on `get`. Capacity is enforced on `set`: once the
//! store grows past `capacity`, the `evict_batch` oldest entries (by creation
//! time) are dropped, whatever their remaining TTL. Reads do not refresh age.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_EVICT_BATCH: usize = 10;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: Instant,
    pub expires_at: Instant,
    /// Insertion order; breaks ties between entries created at the same instant.
    seq: u64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
}

struct Store<T> {
    entries: HashMap<String, CacheEntry<T>>,
    next_seq: u64,
    stats: CacheStats,
}

pub struct ResultCache<T> {
    name: &'static str,
    capacity: usize,
    evict_batch: usize,
    store: Mutex<Store<T>>,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY, DEFAULT_EVICT_BATCH)
    }

    pub fn with_capacity(name: &'static str, capacity: usize, evict_batch: usize) -> Self {
        Self {
            name,
            capacity,
            evict_batch: evict_batch.max(1),
            store: Mutex::new(Store {
                entries: HashMap::new(),
                next_seq: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store<T>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut store = self.lock();

        let Some(expired) = store.entries.get(key).map(|e| e.is_expired(now)) else {
            store.stats.misses += 1;
            tracing::trace!("[Cache:{}] MISS {}", self.name, key);
            return None;
        };

        if expired {
            store.entries.remove(key);
            store.stats.expired += 1;
            store.stats.misses += 1;
            tracing::debug!("[Cache:{}] EXPIRED {}", self.name, key);
            return None;
        }

        store.stats.hits += 1;
        tracing::debug!("[Cache:{}] HIT {}", self.name, key);
        store.entries.get(key).map(|e| e.data.clone())
    }

    /// Last writer wins.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let now = Instant::now();
        let key = key.into();
        let mut store = self.lock();

        let seq = store.next_seq;
        store.next_seq += 1;
        store.entries.insert(key, CacheEntry {
            data: value,
            created_at: now,
            expires_at: now + ttl,
            seq,
        });

        if store.entries.len() > self.capacity {
            self.evict_oldest(&mut store);
        }
    }

    fn evict_oldest(&self, store: &mut Store<T>) {
        let mut by_age: Vec<(Instant, u64, String)> = store.entries.iter()
            .map(|(k, e)| (e.created_at, e.seq, k.clone()))
            .collect();
        by_age.sort_unstable();

        let count = self.evict_batch.min(by_age.len());
        for (_, _, key) in by_age.into_iter().take(count) {
            store.entries.remove(&key);
        }
        store.stats.evicted += count as u64;
        tracing::debug!("[Cache:{}] Capacity exceeded, evicted {} oldest entries ({} remaining)", self.name, count, store.entries.len());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut store = self.lock();
        let count = store.entries.len();
        store.entries.clear();
        tracing::info!("[Cache:{}] Cleared {} entries", self.name, count);
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.lock();
        CacheStats { entries: store.entries.len(), ..store.stats }
    }
}
