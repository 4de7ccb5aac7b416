//! Computed price records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CatalogItem, PricingContext};

/// Confidence attached to prices computed from the multiplier tables.
pub const CALCULATED_CONFIDENCE: f64 = 0.95;

/// Half-width of the quoted price band, as a fraction of the adjusted price.
pub const PRICE_BAND: f64 = 0.10;

/// Where a price figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Base price run through the multiplier tables.
    Calculated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// A context-adjusted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub base_price: f64,
    /// Rounded, never negative.
    pub adjusted_price: u64,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub price_range: PriceRange,
    pub last_updated: DateTime<Utc>,
    pub source: PriceSource,
}

/// Price `base_price` for `context`.
///
/// Multiplies by the region, quality, season, project size and urgency
/// factors in that order and rounds once at the end. Negative or non-finite
/// results clamp to zero.
pub fn calculate_price(base_price: f64, context: &PricingContext) -> PriceRecord {
    let raw = context
        .multipliers()
        .into_iter()
        .fold(base_price, |price, factor| price * factor)
        .round();
    let adjusted_price = if raw.is_finite() && raw > 0.0 {
        raw as u64
    } else {
        0
    };
    let adjusted = adjusted_price as f64;

    PriceRecord {
        base_price,
        adjusted_price,
        confidence: CALCULATED_CONFIDENCE,
        price_range: PriceRange {
            min: adjusted * (1.0 - PRICE_BAND),
            max: adjusted * (1.0 + PRICE_BAND),
        },
        last_updated: Utc::now(),
        source: PriceSource::Calculated,
    }
}

/// A catalog item together with its price for the search context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedItem {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub price: PriceRecord,
}

impl PricedItem {
    pub fn adjusted_price(&self) -> u64 {
        self.price.adjusted_price
    }
}
