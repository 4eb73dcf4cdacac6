mod common;

use common::{harness_with, test_config};
use nrss::coordination::ProgressStatus;
use nrss::events::{Event, EventBus};
use nrss::testing::{entries, MockCatalog, MockFailure};
use nrss::KickOutcome;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn catalog_for(ids: &[&str]) -> MockCatalog {
    let catalog = MockCatalog::new();
    for id in ids {
        catalog.insert_series(id, entries(id, 3));
    }
    catalog
}

#[tokio::test]
async fn test_queue_drains_by_chaining_kicks() {
    let h = harness_with(test_config(), catalog_for(&["a", "b", "c"]));
    for id in ["a", "b", "c"] {
        h.app.feed.enqueue_series(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let handled = h.drain_worker().await;

    assert_eq!(handled, 3);
    assert_eq!(h.catalog.fetched(), vec!["a", "b", "c"]);
    for id in ["a", "b", "c"] {
        assert!(h.app.series_store.read(id).await.unwrap().is_some());
        assert!(h.app.progress.read(id).await.unwrap().is_none());
    }
    assert_eq!(h.app.queue.len().await.unwrap(), 0);
    assert!(h.app.queue.active_claim().await.unwrap().is_none());
}

#[tokio::test]
async fn test_kick_reports_what_it_processed() {
    let h = harness_with(test_config(), catalog_for(&["a", "b"]));
    h.app.queue.enqueue("a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    h.app.queue.enqueue("b").await.unwrap();

    let first = h.app.worker.process_queue_kick().await.unwrap();
    assert_eq!(
        first,
        KickOutcome {
            processed: 1,
            series_id: Some("a".to_string()),
            chained: true,
        }
    );
    let second = h.app.worker.process_queue_kick().await.unwrap();
    assert_eq!(second.series_id.as_deref(), Some("b"));
    assert!(!second.chained);

    let idle = h.app.worker.process_queue_kick().await.unwrap();
    assert_eq!(idle, KickOutcome::default());
}

#[tokio::test]
async fn test_panicking_fetch_is_dropped_and_queue_moves_on() {
    let catalog = catalog_for(&["a", "b", "c"]);
    catalog.set_failure("b", MockFailure::Panic);
    let h = harness_with(test_config(), catalog);
    for id in ["a", "b", "c"] {
        h.app.feed.enqueue_series(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    h.drain_worker().await;

    let progress = h.app.progress.read("b").await.unwrap().expect("failed progress");
    assert_eq!(progress.status, ProgressStatus::Failed);
    assert_eq!(progress.message.as_deref(), Some("Unexpected error while fetching series"));
    assert_eq!(h.app.queue.position("b").await.unwrap(), None);
    assert!(h.app.series_store.read("c").await.unwrap().is_some());
    assert!(h.app.queue.active_claim().await.unwrap().is_none());
}

#[tokio::test]
async fn test_upstream_failure_is_terminal_not_unexpected() {
    let catalog = catalog_for(&["a"]);
    catalog.set_failure("a", MockFailure::Error);
    let h = harness_with(test_config(), catalog);
    h.app.feed.enqueue_series("a").await.unwrap();

    h.drain_worker().await;

    let progress = h.app.progress.read("a").await.unwrap().expect("failed progress");
    assert_eq!(progress.message.as_deref(), Some("no_data"));
    assert_eq!(h.app.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_kick_does_nothing_while_another_claim_is_active() {
    let h = harness_with(test_config(), catalog_for(&["a", "b"]));
    h.app.queue.enqueue("a").await.unwrap();
    h.app.queue.enqueue("b").await.unwrap();
    let foreign = h.app.queue.claim_next().await.unwrap().expect("claim");

    let outcome = h.app.worker.process_queue_kick().await.unwrap();
    assert_eq!(outcome.processed, 0);
    assert_eq!(h.catalog.fetch_calls(), 0);
    assert_eq!(h.app.queue.active_claim().await.unwrap().map(|c| c.token), Some(foreign.token));
}

#[tokio::test]
async fn test_recover_kicks_an_idle_queue_once() {
    let h = harness_with(test_config(), catalog_for(&["a"]));
    assert!(!h.app.worker.recover().await.unwrap());

    h.app.queue.enqueue("a").await.unwrap();
    assert!(h.app.worker.recover().await.unwrap());
    assert!(!h.app.worker.recover().await.unwrap());
    assert_eq!(h.kicks_pending().await, 1);
}

#[tokio::test]
async fn test_run_loop_processes_a_stalled_queue() {
    let h = harness_with(test_config(), catalog_for(&["a", "b"]));
    h.app.queue.enqueue("a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    h.app.queue.enqueue("b").await.unwrap();

    let handle = tokio::spawn(h.app.worker.clone().run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.app.series_store.read("b").await.unwrap().is_none() {
        assert!(tokio::time::Instant::now() < deadline, "queue never drained");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    assert_eq!(h.catalog.fetched(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_on_demand_fetches_run_one_at_a_time() {
    let h = harness_with(test_config(), catalog_for(&["a", "b", "c"]));
    h.catalog.set_fetch_delay(Duration::from_millis(50));
    for id in ["a", "b", "c"] {
        h.bus
            .send(Event::SeriesFetch {
                series_id: id.to_string(),
                lock_token: None,
            })
            .await
            .unwrap();
    }

    let handle = tokio::spawn(h.app.worker.clone().run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    for id in ["a", "b", "c"] {
        while h.app.series_store.read(id).await.unwrap().is_none() {
            assert!(tokio::time::Instant::now() < deadline, "{} never stored", id);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    handle.abort();

    assert_eq!(h.catalog.fetch_calls(), 3);
    assert_eq!(h.catalog.max_in_flight(), 1);
}

#[tokio::test]
async fn test_fetch_concurrency_is_configurable() {
    let config = nrss::config::Config {
        series_fetch_concurrency: 3,
        ..test_config()
    };
    let h = harness_with(config, catalog_for(&["a", "b", "c"]));
    h.catalog.set_fetch_delay(Duration::from_millis(100));

    let worker = h.app.worker.clone();
    let fetches = ["a", "b", "c"].map(|id| {
        let worker = worker.clone();
        tokio::spawn(async move { worker.handle_series_fetch(id, None).await })
    });
    for fetch in fetches {
        assert!(fetch.await.unwrap().unwrap().expect("fetched").is_stored());
    }

    assert!(h.catalog.max_in_flight() > 1);
}
