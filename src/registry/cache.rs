//! In-memory search result cache with TTL and lazy eviction
use crate::registry::types::{RegistrySearchResult, SearchRequest};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default lifetime of a cached search
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: RegistrySearchResult,
    inserted_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Per-registry search cache keyed by a hash of the normalized request
#[derive(Debug)]
pub struct SearchCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    metrics: CacheMetrics,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl SearchCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            metrics: CacheMetrics::default(),
        }
    }

    /// Deterministic key for `request` against `registry_id`
    pub fn cache_key(registry_id: &str, request: &SearchRequest) -> String {
        let normalized = request.normalized();
        // Field order is fixed by the struct definition, so the encoding is stable.
        let encoded = serde_json::to_string(&normalized).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(registry_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(encoded.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Unexpired entry for `key`; an expired one is removed on the way out
    pub fn get(&self, key: &str) -> Option<RegistrySearchResult> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicted expired cache entry {}", key);
        }
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: String, result: RegistrySearchResult) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop expired entries, or the oldest one if nothing has expired
    fn make_room(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let mut evicted = before - self.entries.len();

        if self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.inserted_at)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                self.entries.remove(&key);
                evicted += 1;
            }
        }

        self.metrics
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }
}
