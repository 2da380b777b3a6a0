use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{CacheBackend, CacheValue};
use crate::error::SourceError;

/// Capacity used by [`MemoryCache::default`].
pub const DEFAULT_CAPACITY: usize = 64;

/// In-process cache backend.
///
/// A simple LRU with optional TTL. Entries written with an explicit TTL keep
/// it; others fall back to the cache-wide TTL, if any.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<CacheState>>,
    capacity: usize,
    ttl: Option<Duration>,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    updated_at: Instant,
    ttl: Option<Duration>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MemoryCache {
    /// Creates a new cache with the given capacity.
    ///
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            })),
            capacity,
            ttl: None,
        }
    }

    /// Configures a default time-to-live for cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Number of live entries, expired ones included until they are pruned.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned lock").entries.len()
    }

    /// Returns true when no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_key(state: &mut CacheState, key: &str) {
        if state.entries.remove(key).is_some() {
            state.order.retain(|existing| existing != key);
        }
    }

    fn touch(state: &mut CacheState, key: &str) {
        state.order.retain(|existing| existing != key);
        state.order.push_back(key.to_string());
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        match entry.ttl.or(self.ttl) {
            Some(ttl) => now.saturating_duration_since(entry.updated_at) > ttl,
            None => false,
        }
    }

    fn prune_expired(&self, state: &mut CacheState, now: Instant) {
        state
            .entries
            .retain(|_, entry| !self.is_expired(entry, now));
        let entries = &state.entries;
        state.order.retain(|key| entries.contains_key(key));
    }

    fn evict_if_needed(state: &mut CacheState, capacity: usize) {
        while state.entries.len() > capacity {
            if let Some(key) = state.order.pop_front() {
                state.entries.remove(&key);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> std::result::Result<Option<CacheValue>, SourceError> {
        if self.capacity == 0 {
            return Ok(None);
        }

        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");

        let expired = guard
            .entries
            .get(key)
            .is_some_and(|entry| self.is_expired(entry, now));
        if expired {
            Self::remove_key(&mut guard, key);
            return Ok(None);
        }

        let value = guard.entries.get(key).map(|entry| entry.value.clone());
        if value.is_some() {
            Self::touch(&mut guard, key);
        }
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> std::result::Result<(), SourceError> {
        if self.capacity == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut guard = self.inner.lock().expect("poisoned lock");
        self.prune_expired(&mut guard, now);

        guard.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                updated_at: now,
                ttl,
            },
        );
        Self::touch(&mut guard, key);
        Self::evict_if_needed(&mut guard, self.capacity);
        Ok(())
    }

    async fn clear(&self, key: &str) -> std::result::Result<(), SourceError> {
        let mut guard = self.inner.lock().expect("poisoned lock");
        Self::remove_key(&mut guard, key);
        Ok(())
    }
}
