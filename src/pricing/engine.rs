//! Catalog search and memoised context pricing.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{Catalog, CatalogItem, PriceRecord, PricedItem, PricingContext, calculate_price};
use crate::cache::{PriceCache, PriceCacheConfig};
use crate::history::{History, UsageStatistics};

/// Prices catalog items for a context and logs searches to [`History`].
pub struct PricingEngine {
    catalog: Arc<dyn Catalog>,
    cache: PriceCache,
    history: Arc<History>,
}

impl PricingEngine {
    pub fn new(catalog: Arc<dyn Catalog>, cache: &PriceCacheConfig, history: Arc<History>) -> Self {
        Self {
            catalog,
            cache: PriceCache::new(cache),
            history,
        }
    }

    /// Price `item` for `context`, memoised per `(item id, region, quality)`.
    ///
    /// A hit returns the first-computed record even when season, project
    /// size or urgency differ from the call that filled it.
    pub fn adjusted_price(&self, item: &CatalogItem, context: &PricingContext) -> PriceRecord {
        if let Some(record) = self.cache.get(&item.id, &context.region, context.quality) {
            return record;
        }
        let record = calculate_price(item.base_price, context);
        self.cache
            .insert(&item.id, &context.region, context.quality, record.clone());
        record
    }

    /// Find and price the items matching `query`.
    ///
    /// Catalog failures are logged and yield an empty result. Every call,
    /// including failed ones, is recorded in the search history.
    #[instrument(skip(self, context), fields(catalog = self.catalog.name(), region = %context.region))]
    pub async fn smart_search(
        &self,
        query: &str,
        context: &PricingContext,
        owner_id: Option<&str>,
    ) -> Vec<PricedItem> {
        let items = match self.catalog.find(query).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "catalog lookup failed, returning no results");
                Vec::new()
            }
        };

        let results: Vec<PricedItem> = items
            .into_iter()
            .filter(|item| item.matches(query))
            .map(|item| PricedItem {
                price: self.adjusted_price(&item, context),
                item,
            })
            .collect();

        debug!(results = results.len(), "search priced");
        self.history
            .record_search(query, results.clone(), context.clone(), owner_id);
        results
    }

    /// Forget every memoised price. The catalog is untouched.
    pub fn refresh_all_prices(&self) {
        self.cache.clear();
        debug!("price cache cleared");
    }

    pub fn cache_size(&self) -> u64 {
        self.cache.len()
    }

    pub fn usage_statistics(&self) -> UsageStatistics {
        self.history.usage_statistics(self.cache_size())
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }
}
