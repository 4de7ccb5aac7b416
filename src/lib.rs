//! Mizan - adaptive pricing and request scheduling for construction cost estimation
//!
//! This crate provides the engine behind an estimation dashboard:
//!
//! - a bounded, FIFO-evicting [`TtlCache`] with a background sweeper,
//! - a priority [`RequestScheduler`] that runs slow service calls on a fixed
//!   worker pool and caches their results,
//! - a [`PricingEngine`] that adjusts catalog prices for region, quality,
//!   season, project size and urgency,
//! - a bounded search and snapshot [`History`].
//!
//! # Example
//!
//! ```rust,no_run
//! use mizan::{CatalogItem, Mizan, PricingContext, Region, StaticCatalog};
//!
//! #[tokio::main]
//! async fn main() -> mizan::Result<()> {
//!     let estimator = Mizan::builder()
//!         .catalog(StaticCatalog::new(vec![CatalogItem::new(
//!             "c25",
//!             "Reinforced Concrete Grade 25",
//!             "concrete",
//!             1850.0,
//!         )]))
//!         .build()?;
//!
//!     let context = PricingContext::new().region(Region::Jeddah);
//!     for hit in estimator.smart_search("concrete", &context, None).await {
//!         println!("{}: {} SAR", hit.item.name, hit.adjusted_price());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod estimator;
pub mod history;
pub mod pricing;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod telemetry;

// Re-export main types at crate root
pub use error::{MizanError, Result};
pub use estimator::{Estimator, Mizan, MizanBuilder};

pub use cache::{CacheConfig, CacheStats, TtlCache};
pub use config::{Config, Secrets};
pub use history::{
    History, HistoryConfig, SearchRecord, SnapshotRecord, SnapshotTrigger, UsageStatistics,
};
pub use pricing::{
    Catalog, CatalogItem, PriceRecord, PricedItem, PricingContext, PricingEngine, ProjectSize,
    Quality, Region, Season, StaticCatalog, Urgency, calculate_price,
};
pub use scheduler::{RequestScheduler, ScheduleOptions, Scheduled, SchedulerConfig};
pub use service::{
    Estimate, EstimationService, HttpEstimationService, ResponseScore, optimize_prompt,
    score_response,
};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};
