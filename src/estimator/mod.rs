//! The estimator facade.
//!
//! [`Estimator`] owns one instance of each service object (result cache,
//! scheduler, pricing engine, history) and exposes the operations the
//! application layer calls. Build it once at startup with
//! [`Mizan::builder`] and share it by reference or `Arc`.

mod builder;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

use crate::cache::{CacheStats, TtlCache};
use crate::history::{History, SnapshotRecord, SnapshotTrigger, UsageStatistics};
use crate::pricing::{CatalogItem, PriceRecord, PricedItem, PricingContext, PricingEngine};
use crate::scheduler::{RequestScheduler, ScheduleOptions};
use crate::service::{Estimate, EstimationService, optimize_prompt};
use crate::{MizanError, Result};

pub use builder::{Mizan, MizanBuilder};

pub struct Estimator {
    scheduler: RequestScheduler<String>,
    sweeper: JoinHandle<()>,
    pricing: PricingEngine,
    history: Arc<History>,
    service: Option<Arc<dyn EstimationService>>,
}

impl Estimator {
    /// Ask the estimation service about `prompt`, through the scheduler.
    ///
    /// The prompt is prepared with [`optimize_prompt`]. Results are cached
    /// under `id` per `options`; a failure reaches this caller only and is
    /// never cached.
    #[instrument(skip(self, prompt, context, options))]
    pub async fn estimate(
        &self,
        id: &str,
        prompt: &str,
        context: Option<&PricingContext>,
        options: ScheduleOptions,
    ) -> Result<Estimate> {
        let service = self.service.clone().ok_or_else(|| {
            MizanError::Configuration("no estimation service configured".to_string())
        })?;
        let prompt = optimize_prompt(prompt, context);

        let text = self
            .scheduler
            .schedule(
                id,
                move || async move { service.invoke(&prompt).await },
                options,
            )
            .await?;
        Ok(Estimate::from_text(text))
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// The scheduler, for running arbitrary text-producing operations.
    pub fn scheduler(&self) -> &RequestScheduler<String> {
        &self.scheduler
    }

    pub fn cache(&self) -> &Arc<TtlCache<String>> {
        self.scheduler.cache()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.scheduler.cache().stats()
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    pub async fn smart_search(
        &self,
        query: &str,
        context: &PricingContext,
        owner_id: Option<&str>,
    ) -> Vec<PricedItem> {
        self.pricing.smart_search(query, context, owner_id).await
    }

    pub fn adjusted_price(&self, item: &CatalogItem, context: &PricingContext) -> PriceRecord {
        self.pricing.adjusted_price(item, context)
    }

    pub fn refresh_all_prices(&self) {
        self.pricing.refresh_all_prices();
    }

    pub fn usage_statistics(&self) -> UsageStatistics {
        self.pricing.usage_statistics()
    }

    pub async fn auto_save(
        &self,
        payload: serde_json::Value,
        owner_id: &str,
        trigger: SnapshotTrigger,
    ) -> SnapshotRecord {
        self.history.auto_save(payload, owner_id, trigger).await
    }

    pub async fn list_snapshots(&self, owner_id: &str) -> Vec<SnapshotRecord> {
        self.history.list_snapshots(owner_id).await
    }

    pub async fn open_snapshot(&self, owner_id: &str, id: Uuid) -> Option<SnapshotRecord> {
        self.history.open_snapshot(owner_id, id).await
    }

    pub async fn delete_snapshot(&self, owner_id: &str, id: Uuid) -> bool {
        self.history.delete_snapshot(owner_id, id).await
    }

    /// Load every persisted snapshot list. Returns the number of owners loaded.
    pub async fn hydrate(&self) -> usize {
        self.history.hydrate().await
    }
}

impl Drop for Estimator {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}
