//! Caching subsystem.
//!
//! Two independent caches:
//!
//! - [`TtlCache`]: bounded key/value store with per-entry TTL and
//!   insertion-order (FIFO) eviction. Backs the
//!   [`RequestScheduler`](crate::scheduler::RequestScheduler) so an operation
//!   id runs at most once per TTL window. See [`ttl`] module docs.
//!
//! - [`PriceCache`]: memo of computed [`PriceRecord`](crate::pricing::PriceRecord)s
//!   keyed on `(item, region, quality)`. See [`price`] module docs for the
//!   staleness trade-off that key implies.

pub mod price;
pub mod ttl;

pub use price::{PriceCache, PriceCacheConfig};
pub use ttl::{CacheConfig, CacheStats, TtlCache};
