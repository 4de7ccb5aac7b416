//! Contextual pricing.
//!
//! A [`PricingContext`] picks one multiplier from each of five tables
//! (region, quality, season, project size, urgency). [`calculate_price`]
//! multiplies a catalog item's base price through them and rounds once.
//! [`PricingEngine`] memoises the result and runs catalog searches.
//!
//! ```rust
//! use mizan::pricing::{calculate_price, PricingContext, Quality, Region};
//!
//! let context = PricingContext::new()
//!     .region(Region::Makkah)
//!     .quality(Quality::Economy);
//! // 1000 × 1.12 × 0.80
//! assert_eq!(calculate_price(1000.0, &context).adjusted_price, 896);
//! ```

mod catalog;
mod context;
mod engine;
mod record;

pub use catalog::{Catalog, CatalogItem, StaticCatalog};
pub use context::{PricingContext, ProjectSize, Quality, Region, Season, Urgency};
pub use engine::PricingEngine;
pub use record::{
    CALCULATED_CONFIDENCE, PRICE_BAND, PriceRange, PriceRecord, PriceSource, PricedItem,
    calculate_price,
};
