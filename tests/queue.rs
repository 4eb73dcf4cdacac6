mod common;

use common::FaultyStore;
use futures::future::join_all;
use nrss::coordination::{FetchLock, KickLock, WorkQueue};
use nrss::store::{KvStore, MemoryStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const CLAIM_TTL: Duration = Duration::from_secs(60);

fn queue() -> (WorkQueue, Arc<dyn KvStore>) {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    (WorkQueue::new(store.clone(), CLAIM_TTL), store)
}

async fn enqueue_all(queue: &WorkQueue, ids: &[&str]) {
    for id in ids {
        queue.enqueue(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_claims_one_item_at_a_time_in_fifo_order() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a", "b", "c"]).await;

    let claim = queue.claim_next().await.unwrap().expect("first claim");
    assert_eq!(claim.series_id, "a");
    assert!(queue.claim_next().await.unwrap().is_none(), "slot is taken");

    assert_eq!(queue.position("a").await.unwrap(), Some(0));
    assert_eq!(queue.position("b").await.unwrap(), Some(1));
    assert_eq!(queue.position("c").await.unwrap(), Some(2));
    assert_eq!(queue.position("d").await.unwrap(), None);

    assert!(queue.finalize("a", &claim.token, false).await);
    let next = queue.claim_next().await.unwrap().expect("second claim");
    assert_eq!(next.series_id, "b");
    assert_eq!(queue.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_enqueue_is_deduplicated() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a", "b"]).await;

    let again = queue.enqueue("b").await.unwrap();
    assert!(!again.enqueued);
    assert_eq!(again.position, 2);
    assert_eq!(queue.len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_enqueue_of_active_series_reports_position_zero() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a"]).await;
    queue.claim_next().await.unwrap().expect("claim");

    let result = queue.enqueue("a").await.unwrap();
    assert!(!result.enqueued);
    assert_eq!(result.position, 0);
    assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_finalize_with_wrong_token_leaves_claim() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a", "b"]).await;
    let claim = queue.claim_next().await.unwrap().expect("claim");

    assert!(!queue.finalize("a", "not-the-token", false).await);
    assert!(!queue.finalize("b", &claim.token, false).await);
    let active = queue.active_claim().await.unwrap().expect("still claimed");
    assert_eq!(active.series_id, "a");
    assert_eq!(active.token, claim.token);
}

#[tokio::test]
async fn test_requeue_puts_item_behind_waiting_ones() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a", "b", "c"]).await;
    let claim = queue.claim_next().await.unwrap().expect("claim");

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(queue.finalize("a", &claim.token, true).await);

    let position = queue.position("a").await.unwrap().expect("requeued");
    assert!(position >= 1);
    assert_eq!(position, 3);
    let order: Vec<String> = queue.list().await.unwrap().into_iter().map(|item| item.series_id).collect();
    assert_eq!(order, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn test_expired_claim_frees_the_slot() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let queue = WorkQueue::new(store, Duration::from_millis(50));
    enqueue_all(&queue, &["a", "b"]).await;

    let stale = queue.claim_next().await.unwrap().expect("claim");
    tokio::time::sleep(Duration::from_millis(80)).await;

    let next = queue.claim_next().await.unwrap().expect("claim after expiry");
    assert_eq!(next.series_id, "b");
    // The crashed holder finalizing late must not clear the new claim.
    assert!(!queue.finalize(&stale.series_id, &stale.token, false).await);
    assert_eq!(queue.active_claim().await.unwrap().map(|c| c.series_id), Some("b".to_string()));
}

#[tokio::test]
async fn test_force_clear_and_listing() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a", "b"]).await;
    queue.claim_next().await.unwrap().expect("claim");

    assert!(queue.force_clear_claim().await.unwrap());
    assert!(queue.active_claim().await.unwrap().is_none());
    let listed = queue.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].series_id, "b");
}

#[tokio::test]
async fn test_claim_rolls_back_when_removal_loses() {
    let store: Arc<dyn KvStore> = Arc::new(FaultyStore::losing_removals());
    let queue = WorkQueue::new(store, CLAIM_TTL);
    enqueue_all(&queue, &["a"]).await;

    assert!(queue.claim_next().await.unwrap().is_none());
    assert!(queue.active_claim().await.unwrap().is_none());
}

#[tokio::test]
async fn test_kick_lock_has_one_winner() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let kick = KickLock::new(store, Duration::from_secs(15));

    let results = join_all((0..10).map(|_| {
        let kick = kick.clone();
        tokio::spawn(async move { kick.acquire().await })
    }))
    .await;
    let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(winners, 1);

    assert!(kick.is_held().await);
    assert!(kick.clear().await);
    assert!(kick.acquire().await);
}

#[tokio::test]
async fn test_fetch_lock_single_flight_and_token_release() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let lock = FetchLock::new(store, Duration::from_secs(1800));

    let results = join_all((0..10).map(|_| {
        let lock = lock.clone();
        tokio::spawn(async move { lock.acquire("abels-taarn").await.unwrap() })
    }))
    .await;
    let tokens: Vec<String> = results.into_iter().filter_map(|r| r.unwrap()).collect();
    assert_eq!(tokens.len(), 1);

    assert!(!lock.release("abels-taarn", "someone-else").await);
    assert!(lock.is_held("abels-taarn").await.unwrap());
    assert!(lock.release("abels-taarn", &tokens[0]).await);
    assert!(!lock.is_held("abels-taarn").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_enqueues_drain_once_each_in_score_order() {
    let (queue, _) = queue();
    let ids: Vec<String> = (0..20).map(|n| format!("serie-{:02}", n)).collect();

    let results = join_all(ids.iter().map(|id| {
        let queue = queue.clone();
        let id = id.clone();
        tokio::spawn(async move { queue.enqueue(&id).await.unwrap() })
    }))
    .await;
    assert!(results.into_iter().all(|r| r.unwrap().enqueued));

    let expected: Vec<String> = queue.list().await.unwrap().into_iter().map(|i| i.series_id).collect();
    let mut claimed = Vec::new();
    while let Some(claim) = queue.claim_next().await.unwrap() {
        assert!(queue.finalize(&claim.series_id, &claim.token, false).await);
        claimed.push(claim.series_id);
    }

    assert_eq!(claimed, expected);
    let mut sorted = claimed.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
}

#[tokio::test]
async fn test_repeated_enqueue_reports_same_position() {
    let (queue, _) = queue();
    enqueue_all(&queue, &["a"]).await;
    let first = queue.enqueue("b").await.unwrap();
    let second = queue.enqueue("b").await.unwrap();
    assert!(first.enqueued);
    assert!(!second.enqueued);
    assert_eq!(first.position, second.position);
}
