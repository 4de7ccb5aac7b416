//! Telemetry metric name constants.
//!
//! Centralised metric names for mizan operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mizan_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: which cache: "results" (scheduler) or "pricing"
//! - `reason`: eviction cause: "capacity", "expired" or "sweep"
//! - `status`: outcome: "ok" or "error"
//! - `trigger`: snapshot trigger: "auto", "manual" or "periodic"

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "mizan_cache_hits_total";

/// Total cache misses (absent or expired).
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "mizan_cache_misses_total";

/// Total entries removed by the cache itself.
///
/// Labels: `cache`, `reason`.
pub const CACHE_EVICTIONS_TOTAL: &str = "mizan_cache_evictions_total";

/// Total scheduled operations that ran to completion or failure.
///
/// Labels: `status` ("ok" | "error").
pub const OPERATIONS_TOTAL: &str = "mizan_operations_total";

/// Execution time of scheduled operations in seconds (queue wait excluded).
pub const OPERATION_DURATION_SECONDS: &str = "mizan_operation_duration_seconds";

/// Operations waiting for a free worker.
pub const QUEUE_DEPTH: &str = "mizan_queue_depth";

/// Total smart searches recorded.
pub const SEARCHES_TOTAL: &str = "mizan_searches_total";

/// Total snapshots created.
///
/// Labels: `trigger`.
pub const SNAPSHOTS_TOTAL: &str = "mizan_snapshots_total";

/// Total best-effort persistence failures that were logged and swallowed.
///
/// Labels: `operation` ("save" | "load").
pub const PERSISTENCE_ERRORS_TOTAL: &str = "mizan_persistence_errors_total";
