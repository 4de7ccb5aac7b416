//! Builder for configuring estimator instances

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::Estimator;
use crate::cache::{CacheConfig, PriceCacheConfig, TtlCache};
use crate::config::{Config, Secrets};
use crate::history::{History, HistoryConfig};
use crate::pricing::{Catalog, PricingEngine};
use crate::scheduler::{RequestScheduler, SchedulerConfig};
use crate::service::{EstimationService, HttpEstimationService};
use crate::store::BlobStore;
use crate::{MizanError, Result};

/// Main entry point for creating estimator instances.
pub struct Mizan;

impl Mizan {
    /// Create a new builder for configuring the estimator.
    pub fn builder() -> MizanBuilder {
        MizanBuilder::new()
    }
}

/// Builder for configuring estimator instances.
pub struct MizanBuilder {
    catalog: Option<Arc<dyn Catalog>>,
    service: Option<Arc<dyn EstimationService>>,
    store: Option<Arc<dyn BlobStore>>,
    cache: CacheConfig,
    scheduler: SchedulerConfig,
    pricing: PriceCacheConfig,
    history: HistoryConfig,
}

impl Default for MizanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MizanBuilder {
    pub fn new() -> Self {
        Self {
            catalog: None,
            service: None,
            store: None,
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            pricing: PriceCacheConfig::default(),
            history: HistoryConfig::default(),
        }
    }

    /// Take every tunable from `config`, and an HTTP estimation service
    /// when `[service]` is present.
    ///
    /// Storage is not opened here; pass a store with [`MizanBuilder::store`].
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let mut builder = Self::new()
            .cache(config.cache_config())
            .scheduler(config.scheduler_config())
            .pricing(config.price_cache_config())
            .history(config.history_config());

        if let Some(service) = &config.service {
            let mut http = HttpEstimationService::with_timeout(
                &service.base_url,
                Duration::from_secs(service.timeout_secs),
            )?;
            if let Some(key) = secrets.api_key() {
                http = http.api_key(key);
            }
            builder = builder.service(http);
        }
        Ok(builder)
    }

    /// Item catalog searched and priced by the estimator. Required.
    pub fn catalog(self, catalog: impl Catalog + 'static) -> Self {
        self.shared_catalog(Arc::new(catalog))
    }

    pub fn shared_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Backend for [`Estimator::estimate`].
    pub fn service(self, service: impl EstimationService + 'static) -> Self {
        self.shared_service(Arc::new(service))
    }

    pub fn shared_service(mut self, service: Arc<dyn EstimationService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Persist snapshots to `store`. Without one, snapshots live in memory.
    pub fn store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Result cache in front of the scheduler.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Price memo cache.
    pub fn pricing(mut self, config: PriceCacheConfig) -> Self {
        self.pricing = config;
        self
    }

    pub fn history(mut self, config: HistoryConfig) -> Self {
        self.history = config;
        self
    }

    /// Build the estimator.
    ///
    /// Spawns the scheduler workers and the cache sweeper, so this must be
    /// called from within a tokio runtime.
    pub fn build(self) -> Result<Estimator> {
        let catalog = self.catalog.ok_or_else(|| {
            MizanError::Configuration("a catalog is required to build an estimator".to_string())
        })?;
        if self.cache.sweep_interval.is_zero() {
            return Err(MizanError::Configuration(
                "cache sweep interval must be greater than zero".to_string(),
            ));
        }

        let cache = Arc::new(TtlCache::new("results", &self.cache));
        let sweeper = cache.spawn_sweeper(self.cache.sweep_interval);
        let scheduler = RequestScheduler::new(self.scheduler, Arc::clone(&cache));

        let history = Arc::new(match self.store {
            Some(store) => History::with_store(self.history, store),
            None => History::new(self.history),
        });
        let pricing = PricingEngine::new(catalog, &self.pricing, Arc::clone(&history));

        debug!(
            catalog = pricing.catalog().name(),
            service = ?self.service.as_ref().map(|s| s.name()),
            "estimator built"
        );

        Ok(Estimator {
            scheduler,
            sweeper,
            pricing,
            history,
            service: self.service,
        })
    }
}
