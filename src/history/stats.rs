use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::SearchRecord;

/// Number of categories reported in [`UsageStatistics::popular_categories`].
pub const POPULAR_CATEGORIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Usage figures derived from in-memory history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStatistics {
    /// Every search ever recorded, including ones evicted from the log.
    pub total_searches: u64,
    /// Entries in the pricing cache.
    pub cache_size: u64,
    /// Categories of returned items, most frequent first (ties by name).
    pub popular_categories: Vec<CategoryCount>,
    /// Retained searches per region name.
    pub region_distribution: BTreeMap<String, u64>,
}

impl UsageStatistics {
    pub(crate) fn from_searches<'a>(
        total_searches: u64,
        cache_size: u64,
        searches: impl Iterator<Item = &'a SearchRecord>,
    ) -> Self {
        let mut categories: HashMap<&str, u64> = HashMap::new();
        let mut region_distribution = BTreeMap::new();

        for search in searches {
            *region_distribution
                .entry(search.context.region.as_str().to_string())
                .or_insert(0) += 1;
            for result in &search.results {
                *categories.entry(result.item.category.as_str()).or_insert(0) += 1;
            }
        }

        let mut popular_categories: Vec<CategoryCount> = categories
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        popular_categories.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));
        popular_categories.truncate(POPULAR_CATEGORIES);

        Self {
            total_searches,
            cache_size,
            popular_categories,
            region_distribution,
        }
    }
}
