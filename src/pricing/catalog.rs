//! Catalog items and the catalog lookup seam.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{MizanError, Result};

/// A priced material or work item from the external catalog.
///
/// Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Baseline price in SAR (riyadh, standard, spring, medium, normal).
    pub base_price: f64,
    /// Unit of measure, e.g. `m3` or `ton`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        base_price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            base_price,
            unit: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Case-insensitive substring match on the name and tags.
    ///
    /// A blank query matches every item.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
    }
}

/// Read-only access to the item catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Catalog name for logging/debugging.
    fn name(&self) -> &str;

    /// Items relevant to `query`.
    ///
    /// May return a superset; the pricing engine applies
    /// [`CatalogItem::matches`] itself.
    async fn find(&self, query: &str) -> Result<Vec<CatalogItem>>;
}

/// Catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// Load a JSON array of [`CatalogItem`]s.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|e| {
            MizanError::CatalogAccess(format!("failed to read catalog {path:?}: {e}"))
        })?;
        let items: Vec<CatalogItem> = serde_json::from_slice(&content).map_err(|e| {
            MizanError::CatalogAccess(format!("failed to parse catalog {path:?}: {e}"))
        })?;
        Ok(Self::new(items))
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn find(&self, query: &str) -> Result<Vec<CatalogItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| item.matches(query))
            .cloned()
            .collect())
    }
}
