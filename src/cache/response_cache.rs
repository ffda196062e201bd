//! In-memory response cache keyed by canonical prompt.
//!
//! Two eviction policies: `Lru` keeps at most `capacity` entries and drops the
//! least recently used one on insert, `Unbounded` grows until restart.
//!
//! Lookups take the read lock only; recency and hit counters are atomics, so
//! concurrent readers never wait on each other. Inserts take the write lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CacheError;

/// Default LRU capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Eviction policy for [`ResponseCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Bounded, least-recently-used eviction.
    #[default]
    Lru,
    /// Never evicts.
    Unbounded,
}

impl std::str::FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "unbounded" => Ok(Self::Unbounded),
            other => Err(format!("unknown cache policy '{other}'")),
        }
    }
}

/// A single cached, already sanitized response.
#[derive(Debug)]
struct CacheEntry {
    response: String,
    /// Logical clock value of the last read or write.
    accessed: AtomicU64,
    hit_count: AtomicU64,
}

/// Response cache shared by all in-flight requests.
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    policy: CachePolicy,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache. `capacity` is clamped to at least 1 and only
    /// applies to [`CachePolicy::Lru`].
    pub fn new(policy: CachePolicy, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn lru(capacity: usize) -> Self {
        Self::new(CachePolicy::Lru, capacity)
    }

    pub fn unbounded() -> Self {
        Self::new(CachePolicy::Unbounded, DEFAULT_CACHE_CAPACITY)
    }

    /// Look up a cached response. A poisoned lock is reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Response cache lock poisoned, treating lookup as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        match entries.get(key) {
            Some(entry) => {
                entry.accessed.store(self.tick(), Ordering::Relaxed);
                entry.hit_count.fetch_add(1, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.response.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a response. An existing entry for `key` is replaced (last writer wins).
    pub fn put(&self, key: String, response: String) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        let now = self.tick();

        if let Some(existing) = entries.get_mut(&key) {
            existing.response = response;
            existing.accessed.store(now, Ordering::Relaxed);
            return Ok(());
        }

        if self.policy == CachePolicy::Lru {
            while entries.len() >= self.capacity {
                if !self.evict_lru(&mut entries) {
                    break;
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                response,
                accessed: AtomicU64::new(now),
                hit_count: AtomicU64::new(0),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            policy: self.policy,
            capacity: match self.policy {
                CachePolicy::Lru => Some(self.capacity),
                CachePolicy::Unbounded => None,
            },
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Poison the entry lock by panicking while holding it.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = self.entries.write().unwrap();
                panic!("poisoning response cache lock");
            })
            .join()
        });
    }

    // -- private helpers ---------------------------------------------------

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn evict_lru(&self, entries: &mut HashMap<String, CacheEntry>) -> bool {
        let Some(lru_key) = entries
            .iter()
            .min_by_key(|(_, e)| e.accessed.load(Ordering::Relaxed))
            .map(|(k, _)| k.clone())
        else {
            return false;
        };
        if let Some(evicted) = entries.remove(&lru_key) {
            debug!(
                key = %lru_key,
                hits = evicted.hit_count.load(Ordering::Relaxed),
                "Evicting LRU cache entry"
            );
        }
        self.evictions.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub policy: CachePolicy,
    /// `None` for unbounded caches.
    pub capacity: Option<usize>,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}
