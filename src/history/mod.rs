//! Search and snapshot history.
//!
//! [`History`] keeps two bounded, append-only logs:
//!
//! - **Searches**: every smart search with its context and priced results.
//!   Capped at `search_limit` records (oldest dropped first); the all-time
//!   count survives eviction for usage statistics.
//! - **Snapshots**: per-owner lists of saved project states, capped at
//!   `snapshot_limit` per owner with the oldest creation dropped first.
//!
//! Snapshot lists are mirrored to an optional [`BlobStore`] under
//! `snapshots/{owner}` as JSON. Persistence is best effort: failures are
//! logged and counted, never returned, and never roll back the in-memory
//! state.
//!
//! Every snapshot operation holds a per-owner async lock from load through
//! persist, so writes for one owner reach the store in the order they were
//! applied in memory.

mod record;
mod stats;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::pricing::{PricedItem, PricingContext};
use crate::store::BlobStore;
use crate::telemetry;

pub use record::{SearchRecord, SnapshotRecord, SnapshotTrigger};
pub use stats::{CategoryCount, UsageStatistics};

/// Key prefix for persisted snapshot lists.
pub const SNAPSHOT_KEY_PREFIX: &str = "snapshots/";

/// Retention limits.
///
/// ```rust
/// # use mizan::history::HistoryConfig;
/// let config = HistoryConfig::new().search_limit(500);
/// assert_eq!(config.snapshot_limit, 10);
/// ```
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Search records retained. Default: 100.
    pub search_limit: usize,
    /// Snapshots retained per owner. Default: 10. Values below 1 are
    /// treated as 1.
    pub snapshot_limit: usize,
    /// Length of the recent-query list shown to users. Default: 10.
    pub recent_queries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            search_limit: 100,
            snapshot_limit: 10,
            recent_queries: 10,
        }
    }
}

impl HistoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_limit(mut self, n: usize) -> Self {
        self.search_limit = n;
        self
    }

    pub fn snapshot_limit(mut self, n: usize) -> Self {
        self.snapshot_limit = n;
        self
    }

    pub fn recent_queries(mut self, n: usize) -> Self {
        self.recent_queries = n;
        self
    }
}

fn snapshot_key(owner_id: &str) -> String {
    format!("{SNAPSHOT_KEY_PREFIX}{owner_id}")
}

/// Bounded search log and per-owner snapshot lists.
pub struct History {
    config: HistoryConfig,
    searches: Mutex<VecDeque<SearchRecord>>,
    total_searches: AtomicU64,
    snapshots: Mutex<HashMap<String, VecDeque<SnapshotRecord>>>,
    owner_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    store: Option<Arc<dyn BlobStore>>,
}

impl History {
    /// In-memory history with no persistence.
    pub fn new(config: HistoryConfig) -> Self {
        let config = HistoryConfig {
            snapshot_limit: config.snapshot_limit.max(1),
            ..config
        };
        Self {
            config,
            searches: Mutex::new(VecDeque::new()),
            total_searches: AtomicU64::new(0),
            snapshots: Mutex::new(HashMap::new()),
            owner_locks: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    /// History whose snapshot lists are mirrored to `store`.
    pub fn with_store(config: HistoryConfig, store: Arc<dyn BlobStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn lock_searches(&self) -> MutexGuard<'_, VecDeque<SearchRecord>> {
        self.searches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_snapshots(&self) -> MutexGuard<'_, HashMap<String, VecDeque<SnapshotRecord>>> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive use of `owner_id`'s snapshot list.
    async fn lock_owner(&self, owner_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.owner_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(owner_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    // ------------------------------------------------------------------
    // Searches
    // ------------------------------------------------------------------

    /// Append a search to the log, dropping the oldest record past the limit.
    pub fn record_search(
        &self,
        query: &str,
        results: Vec<PricedItem>,
        context: PricingContext,
        owner_id: Option<&str>,
    ) -> SearchRecord {
        let record = SearchRecord {
            id: Uuid::now_v7(),
            query: query.to_string(),
            results,
            timestamp: Utc::now(),
            context,
            owner_id: owner_id.map(str::to_string),
        };

        let mut searches = self.lock_searches();
        searches.push_back(record.clone());
        while searches.len() > self.config.search_limit {
            searches.pop_front();
        }
        drop(searches);

        self.total_searches.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::SEARCHES_TOTAL).increment(1);
        record
    }

    /// Retained searches, newest first.
    pub fn searches(&self) -> Vec<SearchRecord> {
        self.lock_searches().iter().rev().cloned().collect()
    }

    /// Searches recorded since creation, including evicted ones.
    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    /// Most recent distinct queries (trimmed, case-insensitive), newest first.
    pub fn recent_queries(&self) -> Vec<String> {
        let searches = self.lock_searches();
        let mut seen = std::collections::HashSet::new();
        searches
            .iter()
            .rev()
            .map(|s| s.query.trim())
            .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
            .take(self.config.recent_queries)
            .map(str::to_string)
            .collect()
    }

    /// Usage figures derived from the retained search log.
    pub fn usage_statistics(&self, cache_size: u64) -> UsageStatistics {
        let searches = self.lock_searches();
        UsageStatistics::from_searches(self.total_searches(), cache_size, searches.iter())
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Save a snapshot of `payload` for `owner_id`.
    ///
    /// Past `snapshot_limit`, the owner's earliest-created snapshot is
    /// dropped. The updated list is then persisted (best effort).
    #[instrument(skip(self, payload), fields(operation = "auto_save"))]
    pub async fn auto_save(
        &self,
        payload: serde_json::Value,
        owner_id: &str,
        trigger: SnapshotTrigger,
    ) -> SnapshotRecord {
        let _owner = self.lock_owner(owner_id).await;
        self.ensure_loaded(owner_id).await;

        let now = Utc::now();
        let record = SnapshotRecord {
            id: Uuid::now_v7(),
            owner_id: owner_id.to_string(),
            name: format!("{} {}", trigger.label(), now.format("%Y-%m-%d %H:%M:%S")),
            payload,
            trigger,
            created_at: now,
            last_accessed_at: now,
        };

        let list = {
            let mut snapshots = self.lock_snapshots();
            let list = snapshots.entry(owner_id.to_string()).or_default();
            list.push_back(record.clone());
            while list.len() > self.config.snapshot_limit {
                if let Some(dropped) = list.pop_front() {
                    debug!(owner = owner_id, snapshot = %dropped.id, "snapshot retired");
                }
            }
            list.clone()
        };

        metrics::counter!(telemetry::SNAPSHOTS_TOTAL, "trigger" => trigger.as_str()).increment(1);
        self.persist(owner_id, &list).await;
        record
    }

    /// The owner's snapshots, most recently accessed first.
    #[instrument(skip(self), fields(operation = "list_snapshots"))]
    pub async fn list_snapshots(&self, owner_id: &str) -> Vec<SnapshotRecord> {
        let _owner = self.lock_owner(owner_id).await;
        self.ensure_loaded(owner_id).await;

        let snapshots = self.lock_snapshots();
        let mut list: Vec<SnapshotRecord> = snapshots
            .get(owner_id)
            .map(|l| l.iter().rev().cloned().collect())
            .unwrap_or_default();
        // Stable sort: equal access times keep newest-created first.
        list.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        list
    }

    /// Fetch one snapshot and mark it as just accessed.
    pub async fn open_snapshot(&self, owner_id: &str, id: Uuid) -> Option<SnapshotRecord> {
        let _owner = self.lock_owner(owner_id).await;
        self.ensure_loaded(owner_id).await;

        let (found, list) = {
            let mut snapshots = self.lock_snapshots();
            let list = snapshots.get_mut(owner_id)?;
            let record = list.iter_mut().find(|s| s.id == id)?;
            record.last_accessed_at = Utc::now();
            (record.clone(), list.clone())
        };

        self.persist(owner_id, &list).await;
        Some(found)
    }

    /// Remove one snapshot. Returns whether it existed.
    pub async fn delete_snapshot(&self, owner_id: &str, id: Uuid) -> bool {
        let _owner = self.lock_owner(owner_id).await;
        self.ensure_loaded(owner_id).await;

        let list = {
            let mut snapshots = self.lock_snapshots();
            let Some(list) = snapshots.get_mut(owner_id) else {
                return false;
            };
            let before = list.len();
            list.retain(|s| s.id != id);
            if list.len() == before {
                return false;
            }
            list.clone()
        };

        self.persist(owner_id, &list).await;
        true
    }

    /// Load every persisted owner list not already in memory.
    ///
    /// Returns the number of owners loaded.
    pub async fn hydrate(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let keys = match store.list(SNAPSHOT_KEY_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(store = store.name(), error = %e, "failed to list persisted snapshots");
                metrics::counter!(telemetry::PERSISTENCE_ERRORS_TOTAL, "operation" => "load")
                    .increment(1);
                return 0;
            }
        };

        let mut loaded = 0;
        for key in keys {
            if let Some(owner_id) = key.strip_prefix(SNAPSHOT_KEY_PREFIX) {
                let _owner = self.lock_owner(owner_id).await;
                if self.ensure_loaded(owner_id).await {
                    loaded += 1;
                }
            }
        }
        loaded
    }

    /// Pull the owner's list from the store if it is not in memory yet.
    /// Callers hold the owner lock.
    ///
    /// Returns whether a list was loaded. On a read failure nothing is
    /// cached, so the next call tries again.
    async fn ensure_loaded(&self, owner_id: &str) -> bool {
        if self.lock_snapshots().contains_key(owner_id) {
            return false;
        }
        let Some(store) = &self.store else {
            return false;
        };

        let loaded: VecDeque<SnapshotRecord> = match store.get(&snapshot_key(owner_id)).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<SnapshotRecord>>(&bytes) {
                Ok(list) => list.into(),
                Err(e) => {
                    warn!(owner = owner_id, error = %e, "discarding unreadable snapshot list");
                    metrics::counter!(telemetry::PERSISTENCE_ERRORS_TOTAL, "operation" => "load")
                        .increment(1);
                    VecDeque::new()
                }
            },
            Ok(None) => return false,
            Err(e) => {
                warn!(owner = owner_id, error = %e, "failed to load snapshots");
                metrics::counter!(telemetry::PERSISTENCE_ERRORS_TOTAL, "operation" => "load")
                    .increment(1);
                return false;
            }
        };

        let mut snapshots = self.lock_snapshots();
        if snapshots.contains_key(owner_id) {
            return false;
        }
        debug!(owner = owner_id, count = loaded.len(), "snapshots loaded from store");
        snapshots.insert(owner_id.to_string(), loaded);
        true
    }

    async fn persist(&self, owner_id: &str, list: &VecDeque<SnapshotRecord>) {
        let Some(store) = &self.store else {
            return;
        };
        let result = match serde_json::to_vec(list) {
            Ok(bytes) => store.put(&snapshot_key(owner_id), bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(
                owner = owner_id,
                store = store.name(),
                error = %e,
                "failed to persist snapshots, keeping in-memory copy"
            );
            metrics::counter!(telemetry::PERSISTENCE_ERRORS_TOTAL, "operation" => "save")
                .increment(1);
        }
    }
}
