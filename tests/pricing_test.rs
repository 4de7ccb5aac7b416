//! Tests for the contextual pricing pipeline and smart search.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mizan::cache::PriceCacheConfig;
use mizan::pricing::{
    Catalog, CatalogItem, PriceSource, PricingContext, PricingEngine, ProjectSize, Quality,
    Region, Season, StaticCatalog, Urgency, calculate_price,
};
use mizan::{History, HistoryConfig, MizanError, Result};

fn sample_catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        CatalogItem::new("c25", "Reinforced Concrete Grade 25", "concrete", 1850.0).unit("m3"),
        CatalogItem::new("rb16", "Steel Rebar 16mm", "steel", 2900.0)
            .unit("ton")
            .tag("reinforcement"),
        CatalogItem::new("blk", "Hollow Concrete Block", "masonry", 3.5),
        CatalogItem::new("tile", "Porcelain Floor Tile", "finishes", 85.0).tag("flooring"),
    ])
}

fn engine(catalog: impl Catalog + 'static) -> PricingEngine {
    PricingEngine::new(
        Arc::new(catalog),
        &PriceCacheConfig::default(),
        Arc::new(History::new(HistoryConfig::default())),
    )
}

#[test]
fn worst_case_context_is_1865() {
    let item = CatalogItem::new("x", "Anything", "misc", 1000.0);
    let context = PricingContext::new()
        .region(Region::Jeddah)
        .quality(Quality::Premium)
        .season(Season::Summer)
        .project_size(ProjectSize::Small)
        .urgency(Urgency::Urgent);

    let record = engine(StaticCatalog::default()).adjusted_price(&item, &context);
    assert_eq!(record.adjusted_price, 1865);
    assert_eq!(record.base_price, 1000.0);
    assert_eq!(record.source, PriceSource::Calculated);
}

#[test]
fn identity_context_returns_base_price() {
    let engine = engine(StaticCatalog::default());
    for base in [1.0, 85.0, 1850.0, 2900.0] {
        let item = CatalogItem::new(format!("i{base}"), "item", "misc", base);
        let record = engine.adjusted_price(&item, &PricingContext::default());
        assert_eq!(record.adjusted_price as f64, base);
    }
}

#[test]
fn every_region_multiplier() {
    let table = [
        ("riyadh", 1000),
        ("jeddah", 1080),
        ("dammam", 1050),
        ("makkah", 1120),
        ("khobar", 1060),
        ("abha", 980),
        ("taif", 1070),
        ("tabuk", 1020),
        ("hail", 1000),
        ("qassim", 1030),
        ("najran", 1000),
    ];
    for (region, expected) in table {
        let context = PricingContext::new().region(region);
        assert_eq!(
            calculate_price(1000.0, &context).adjusted_price,
            expected,
            "region {region}"
        );
    }
}

#[test]
fn memoised_price_survives_season_and_urgency_change() {
    let engine = engine(StaticCatalog::default());
    let item = CatalogItem::new("rb16", "Steel Rebar 16mm", "steel", 2900.0);
    let spring = PricingContext::new().region(Region::Dammam);
    let urgent_summer = spring
        .clone()
        .season(Season::Summer)
        .urgency(Urgency::Urgent)
        .project_size(ProjectSize::Small);

    let first = engine.adjusted_price(&item, &spring);
    let second = engine.adjusted_price(&item, &urgent_summer);
    assert_eq!(first, second);

    engine.refresh_all_prices();
    let fresh = engine.adjusted_price(&item, &urgent_summer);
    assert_ne!(fresh.adjusted_price, first.adjusted_price);
}

#[tokio::test]
async fn memoised_price_is_recomputed_after_ttl() {
    // moka keeps its own clock, so this waits in real time.
    let engine = PricingEngine::new(
        Arc::new(StaticCatalog::default()),
        &PriceCacheConfig::new().ttl(Duration::from_millis(50)),
        Arc::new(History::new(HistoryConfig::default())),
    );
    let item = CatalogItem::new("rb16", "Steel Rebar 16mm", "steel", 2900.0);
    let spring = PricingContext::new().region(Region::Jeddah);
    let urgent_summer = spring
        .clone()
        .season(Season::Summer)
        .urgency(Urgency::Urgent);

    let first = engine.adjusted_price(&item, &spring);
    assert_eq!(engine.adjusted_price(&item, &urgent_summer), first);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let after = engine.adjusted_price(&item, &urgent_summer);
    assert_eq!(
        after.adjusted_price,
        calculate_price(2900.0, &urgent_summer).adjusted_price
    );
    assert_ne!(after.adjusted_price, first.adjusted_price);
}

#[tokio::test]
async fn end_to_end_concrete_search() {
    let engine = engine(StaticCatalog::new(vec![
        CatalogItem::new("c25", "Reinforced Concrete Grade 25", "concrete", 1850.0),
        CatalogItem::new("rb16", "Steel Rebar 16mm", "steel", 2900.0),
    ]));
    let context = PricingContext::new()
        .region(Region::Riyadh)
        .quality(Quality::Standard)
        .season(Season::Spring)
        .project_size(ProjectSize::Medium)
        .urgency(Urgency::Normal);

    let results = engine.smart_search("concrete", &context, None).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.name, "Reinforced Concrete Grade 25");
    assert_eq!(results[0].adjusted_price(), 1850);
}

#[tokio::test]
async fn search_matches_tags_and_is_case_insensitive() {
    let engine = engine(sample_catalog());
    let context = PricingContext::default();

    let reinforcement = engine.smart_search("REINFORCEMENT", &context, None).await;
    assert_eq!(reinforcement.len(), 1);
    assert_eq!(reinforcement[0].item.id, "rb16");

    let concrete = engine.smart_search("concrete", &context, None).await;
    let ids: Vec<_> = concrete.iter().map(|p| p.item.id.as_str()).collect();
    assert_eq!(ids, vec!["c25", "blk"]);
}

#[tokio::test]
async fn search_applies_context() {
    let engine = engine(sample_catalog());
    let context = PricingContext::new()
        .region(Region::Makkah)
        .quality(Quality::Economy);

    let results = engine.smart_search("tile", &context, Some("u1")).await;
    // 85 × 1.12 × 0.80 = 76.16
    assert_eq!(results[0].adjusted_price(), 76);
}

/// Catalog that returns everything regardless of the query.
struct SupersetCatalog(Vec<CatalogItem>);

#[async_trait]
impl Catalog for SupersetCatalog {
    fn name(&self) -> &str {
        "superset"
    }

    async fn find(&self, _query: &str) -> Result<Vec<CatalogItem>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn engine_filters_catalog_supersets() {
    let engine = engine(SupersetCatalog(sample_catalog().items().to_vec()));
    let results = engine
        .smart_search("porcelain", &PricingContext::default(), None)
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.id, "tile");
}

struct UnreachableCatalog;

#[async_trait]
impl Catalog for UnreachableCatalog {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn find(&self, _query: &str) -> Result<Vec<CatalogItem>> {
        Err(MizanError::CatalogAccess("database offline".to_string()))
    }
}

#[tokio::test]
async fn catalog_failure_yields_empty_results() {
    let engine = engine(UnreachableCatalog);
    let results = engine
        .smart_search("concrete", &PricingContext::default(), None)
        .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn catalog_loads_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "c25", "name": "Reinforced Concrete Grade 25", "category": "concrete", "base_price": 1850},
            {"id": "sand", "name": "Washed Sand", "category": "aggregates", "base_price": 60, "unit": "m3", "tags": ["fill"]}
        ]"#,
    )
    .unwrap();

    let catalog = StaticCatalog::from_json_file(&path).await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.find("fill").await.unwrap()[0].id, "sand");
}

#[tokio::test]
async fn missing_catalog_file_is_catalog_access_error() {
    let err = StaticCatalog::from_json_file("/nonexistent/catalog.json")
        .await
        .unwrap_err();
    assert!(matches!(err, MizanError::CatalogAccess(_)));
}
