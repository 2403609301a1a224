//! Performance tests for Navdex
//!
//! Bounds are loose; they catch accidental quadratic behavior, not regressions
//! of a few percent.

use navdex::{
    CacheStore, EntityKind, IndexConfig, IndexStore, IndexedEntity, Indexer, MemoryPersistence,
    Scope, SearchEngine,
};
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn synthetic_entities(count: usize) -> Vec<IndexedEntity> {
    let prefixes = ["User", "Order", "Invoice", "Session", "Payment", "Report"];
    let suffixes = ["Service", "Controller", "Repository", "Handler", "Factory"];

    (0..count)
        .map(|i| {
            let name = format!(
                "{}{}{}",
                prefixes[i % prefixes.len()],
                suffixes[(i / prefixes.len()) % suffixes.len()],
                i
            );
            let path = format!("/work/src/module_{}.rs", i / 20);
            let kind = if i % 3 == 0 {
                EntityKind::Class
            } else {
                EntityKind::Method
            };
            IndexedEntity::symbol("ts", &path, name, kind, None, i % 500 + 1, 0)
        })
        .collect()
}

#[test]
fn test_search_large_store_performance() {
    let store = Arc::new(IndexStore::new());
    store.set_items(synthetic_entities(50_000));
    let engine = SearchEngine::new(store);

    let start = Instant::now();
    let results = engine.search("UsrSvc", Scope::Everything, 50, true);
    let elapsed = start.elapsed();

    println!("Fuzzy search over 50k entities: {:?}", elapsed);
    assert!(!results.is_empty());
    assert!(results.len() <= 50);
    assert!(elapsed < Duration::from_secs(5));

    let start = Instant::now();
    let burst = engine.burst_search("invoice", Scope::Everything, 50);
    println!("Burst search over 50k entities: {:?}", start.elapsed());
    assert_eq!(burst.len(), 50);
}

#[tokio::test]
async fn test_index_many_files_performance() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..300 {
        fs::write(
            temp_dir.path().join(format!("module_{}.ts", i)),
            format!(
                "export class Widget{i} {{\n  render(): void {{}}\n}}\nexport function make{i}() {{}}\n"
            ),
        )
        .unwrap();
    }

    let store = Arc::new(IndexStore::new());
    let indexer = Indexer::new(
        temp_dir.path(),
        IndexConfig::default(),
        store.clone(),
        CacheStore::new(Box::new(MemoryPersistence::new())),
    )
    .unwrap();

    let start = Instant::now();
    let stats = indexer.index_workspace(None).await.unwrap();
    let cold = start.elapsed();

    let start = Instant::now();
    let warm_stats = indexer.index_workspace(None).await.unwrap();
    let warm = start.elapsed();

    println!("Cold index of 300 files: {:?}, warm: {:?}", cold, warm);
    assert_eq!(stats.files, 300);
    assert_eq!(stats.extracted, 300);
    assert_eq!(warm_stats.cache_hits, 300);
    // File + class + method + function per module
    assert_eq!(store.get_item_count(), 1200);
    assert!(cold < Duration::from_secs(30));
}
