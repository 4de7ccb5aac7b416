//! Bounded TTL cache with insertion-order eviction.
//!
//! [`TtlCache`] is the cache the [`RequestScheduler`](crate::scheduler::RequestScheduler)
//! consults before running an operation. Entries carry their own TTL and the
//! cache never holds more than `max_entries` of them.
//!
//! # Eviction
//!
//! When a new key arrives at capacity, the entry that was inserted earliest is
//! dropped, regardless of how recently it was read (FIFO, not LRU). Overwriting
//! an existing key refreshes its value and TTL but keeps its place in line.
//!
//! Insertion order lives in a `VecDeque` of `(key, sequence)` records next to
//! the `HashMap`. Removing a key does not touch the deque; stale records are
//! skipped at eviction time and compacted away once they outnumber live
//! entries, so eviction stays amortised O(1).
//!
//! # Expiry
//!
//! An entry is expired once more than its TTL has elapsed since insertion.
//! Expired entries are treated as absent on read (and removed as a side
//! effect). [`TtlCache::spawn_sweeper`] removes them proactively on a fixed
//! interval so memory stays bounded without reads.
//!
//! Time is read through [`tokio::time::Instant`], so tests can drive expiry
//! with a paused runtime clock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;

/// Configuration for a [`TtlCache`].
///
/// ```rust
/// # use mizan::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of resident entries. Default: 1,000.
    pub max_entries: usize,
    /// TTL applied by [`TtlCache::insert`]. Default: 5 minutes.
    pub ttl: Duration,
    /// Interval of the background sweep. Default: 60 seconds.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of resident entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the default time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Point-in-time view of a cache's occupancy and effectiveness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    /// Resident entries, including expired ones not yet swept.
    pub size: usize,
    pub max_size: usize,
    /// `hits / (hits + misses)` since creation, `0.0` before the first read.
    pub hit_rate: f64,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    seq: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn is_live(&self, key: &str, seq: u64) -> bool {
        self.entries.get(key).is_some_and(|e| e.seq == seq)
    }

    /// Drop the earliest-inserted live entry. Returns its key.
    fn evict_oldest(&mut self) -> Option<String> {
        while let Some((key, seq)) = self.order.pop_front() {
            if self.is_live(&key, seq) {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn compact_order(&mut self) {
        if self.order.len() <= self.entries.len() * 2 + 16 {
            return;
        }
        let order = std::mem::take(&mut self.order);
        self.order = order
            .into_iter()
            .filter(|(key, seq)| self.is_live(key, *seq))
            .collect();
    }
}

/// Thread-safe bounded cache with per-entry TTL and FIFO eviction.
///
/// All mutation happens under one mutex, so insertion, eviction and sweeping
/// never interleave. Never fails: unknown or expired keys simply miss.
pub struct TtlCache<V> {
    name: &'static str,
    max_entries: usize,
    default_ttl: Duration,
    inner: Mutex<Inner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache from `config`. `name` labels the cache's metrics.
    pub fn new(name: &'static str, config: &CacheConfig) -> Self {
        Self {
            name,
            max_entries: config.max_entries.max(1),
            default_ttl: config.ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert with the configured default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite `key`, expiring after `ttl`.
    ///
    /// At capacity, a new key first evicts the earliest-inserted entry.
    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.inserted_at = now;
            entry.ttl = ttl;
            return;
        }

        if inner.entries.len() >= self.max_entries {
            if let Some(evicted) = inner.evict_oldest() {
                debug!(cache = self.name, key = %evicted, "evicted oldest entry at capacity");
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL,
                    "cache" => self.name,
                    "reason" => "capacity",
                )
                .increment(1);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((key.clone(), seq));
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                ttl,
                seq,
            },
        );
        inner.compact_order();
    }

    /// Look up `key`.
    ///
    /// Returns `None` if the key is missing or expired; an expired entry is
    /// removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = inner.entries.get(key).map(|entry| entry.is_expired(now));
        let found = match expired {
            Some(true) => {
                inner.entries.remove(key);
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL,
                    "cache" => self.name,
                    "reason" => "expired",
                )
                .increment(1);
                None
            }
            Some(false) => inner.entries.get(key).map(|entry| entry.value.clone()),
            None => None,
        };
        drop(inner);

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name).increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name).increment(1);
        }
        found
    }

    /// Whether a live entry exists for `key`. Same semantics as [`get`](Self::get).
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`. Returns whether an entry was resident.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.remove(key).is_some();
        inner.compact_order();
        removed
    }

    /// Evict all entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - inner.entries.len();
        inner.compact_order();
        drop(inner);

        if purged > 0 {
            debug!(cache = self.name, purged, "swept expired entries");
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL,
                "cache" => self.name,
                "reason" => "sweep",
            )
            .increment(purged as u64);
        }
        purged
    }

    /// Number of resident entries (expired-but-unswept included).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy and approximate hit rate.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let reads = hits + misses;
        CacheStats {
            size: self.len(),
            max_size: self.max_entries,
            hit_rate: if reads == 0 {
                0.0
            } else {
                hits as f64 / reads as f64
            },
        }
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Spawn a task that calls [`purge_expired`](Self::purge_expired) every
    /// `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context. The spawned task panics if
    /// `interval` is zero.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }
}
