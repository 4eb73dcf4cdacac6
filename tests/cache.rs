mod common;

use chrono::Utc;
use common::{harness, harness_with, test_config, Harness};
use nrss::catalog::build_series;
use nrss::testing::{catalog, entries, MockCatalog, MockFailure};
use nrss::{CacheMissMode, Series};
use pretty_assertions::assert_eq;

/// Stores a snapshot of the first `known` entries, fetched two hours ago.
async fn seed_stale(h: &Harness, series_id: &str, known: u32) -> Series {
    let refs = entries("ep", known);
    let episodes = refs
        .iter()
        .map(|entry| entry.resolve(format!("https://cdn.test/{}.mp3", entry.id)))
        .collect();
    let mut series = build_series(&catalog(series_id, Vec::new()).metadata, episodes);
    series.last_fetched_at = Utc::now() - chrono::Duration::hours(2);
    let (stored, ok) = h.app.series_store.write(series).await;
    assert!(ok);
    stored
}

#[tokio::test]
async fn test_trigger_mode_miss_returns_none_without_fetching() {
    let h = harness_with(test_config(), MockCatalog::new().with_series("s", entries("ep", 3)));
    let result = h.app.cache.get_series("s", CacheMissMode::Trigger).await.unwrap();
    assert!(result.is_none());
    assert_eq!(h.catalog.fetch_calls(), 0);
}

#[tokio::test]
async fn test_fetch_mode_miss_fetches_inline() {
    let h = harness_with(test_config(), MockCatalog::new().with_series("s", entries("ep", 3)));
    let series = h.app.cache.get_series("s", CacheMissMode::default()).await.unwrap().expect("fetched");
    assert_eq!(series.episodes.len(), 3);
    assert_eq!(h.catalog.fetch_calls(), 1);

    // Fresh now; no further upstream traffic.
    let again = h.app.cache.get_series("s", CacheMissMode::Fetch).await.unwrap().expect("hit");
    assert_eq!(again, series);
    assert_eq!(h.catalog.fetch_calls(), 1);
    assert_eq!(h.catalog.update_calls(), 0);
}

#[tokio::test]
async fn test_fetch_mode_miss_for_unknown_series_is_none() {
    let h = harness();
    assert!(h.app.cache.get_series("ukjent", CacheMissMode::Fetch).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_snapshot_is_refreshed_incrementally() {
    let h = harness_with(test_config(), MockCatalog::new().with_series("s", entries("ep", 5)));
    let before = seed_stale(&h, "s", 3).await;

    let refreshed = h.app.cache.get_series("s", CacheMissMode::Trigger).await.unwrap().expect("hit");

    assert_eq!(h.catalog.fetch_calls(), 0);
    assert_eq!(h.catalog.update_calls(), 1);
    let ids: Vec<&str> = refreshed.episodes.iter().map(|ep| ep.id.as_str()).collect();
    assert_eq!(ids, vec!["ep-4", "ep-3", "ep-2", "ep-1", "ep-0"]);
    assert!(refreshed.last_fetched_at > before.last_fetched_at);
    assert!(!h.app.cache.is_stale(&refreshed));

    let stored = h.app.series_store.read("s").await.unwrap().expect("snapshot");
    assert_eq!(stored, refreshed);
}

#[tokio::test]
async fn test_stale_snapshot_without_new_episodes_is_returned_unchanged() {
    let h = harness_with(test_config(), MockCatalog::new().with_series("s", entries("ep", 3)));
    let before = seed_stale(&h, "s", 3).await;

    let result = h.app.cache.get_series("s", CacheMissMode::Fetch).await.unwrap().expect("hit");
    assert_eq!(result, before);
    assert_eq!(h.app.series_store.read("s").await.unwrap(), Some(before));
}

#[tokio::test]
async fn test_upstream_failure_during_refresh_serves_existing() {
    let catalog = MockCatalog::new().with_series("s", entries("ep", 5));
    catalog.set_failure("s", MockFailure::Error);
    let h = harness_with(test_config(), catalog);
    let before = seed_stale(&h, "s", 2).await;

    let result = h.app.cache.get_series("s", CacheMissMode::Fetch).await.unwrap().expect("hit");
    assert_eq!(result, before);
}

#[tokio::test]
async fn test_refresh_result_respects_byte_budget() {
    let config = nrss::config::Config {
        max_series_bytes: 1_500,
        ..test_config()
    };
    let h = harness_with(config, MockCatalog::new().with_series("s", entries("ep", 30)));
    seed_stale(&h, "s", 2).await;

    let refreshed = h.app.cache.get_series("s", CacheMissMode::Trigger).await.unwrap().expect("hit");
    assert!(refreshed.serialized_len() <= 1_500);
    assert_eq!(refreshed.episodes[0].id, "ep-29");
}
