//! Memo cache for computed prices.
//!
//! [`PriceCache`] holds [`PriceRecord`]s keyed on `(item id, region, quality)`.
//! Season, project size and urgency are deliberately left out of the key:
//! within one TTL window, a lookup that differs only in those dimensions gets
//! the first-computed record back. Callers that need a fresh figure call
//! [`PricingEngine::refresh_all_prices`](crate::pricing::PricingEngine::refresh_all_prices)
//! or wait out the TTL.
//!
//! Backed by moka's concurrent TTL cache, owned per engine instance.

use std::time::Duration;

use moka::sync::Cache;

use crate::pricing::{PriceRecord, Quality, Region};
use crate::telemetry;

/// Configuration for the price memo cache.
///
/// ```rust
/// # use mizan::cache::PriceCacheConfig;
/// # use std::time::Duration;
/// let config = PriceCacheConfig::new().ttl(Duration::from_secs(60));
/// assert_eq!(config.max_entries, 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct PriceCacheConfig {
    /// Maximum number of cached prices. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached prices. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for PriceCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

impl PriceCacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached prices.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached prices.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// `(item id, region name, quality)`.
type PriceKey = (String, String, Quality);

/// In-memory memo of adjusted prices.
pub struct PriceCache {
    cache: Cache<PriceKey, PriceRecord>,
}

impl PriceCache {
    /// Create a new price cache with the given configuration.
    pub fn new(config: &PriceCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up a memoised price. Emits cache hit/miss metrics.
    pub fn get(&self, item_id: &str, region: &Region, quality: Quality) -> Option<PriceRecord> {
        let key = price_key(item_id, region, quality);
        match self.cache.get(&key) {
            Some(record) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "pricing").increment(1);
                Some(record)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "pricing")
                    .increment(1);
                None
            }
        }
    }

    /// Memoise a price.
    pub fn insert(&self, item_id: &str, region: &Region, quality: Quality, record: PriceRecord) {
        self.cache
            .insert(price_key(item_id, region, quality), record);
    }

    /// Number of memoised prices.
    ///
    /// Runs moka's pending maintenance first so the count reflects recent
    /// inserts and invalidations.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every memoised price.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }
}

fn price_key(item_id: &str, region: &Region, quality: Quality) -> PriceKey {
    (item_id.to_string(), region.as_str().to_string(), quality)
}
