#![allow(dead_code)]

use async_trait::async_trait;
use nrss::config::{Config, StoreBackend};
use nrss::error::NrssError;
use nrss::events::{ChannelEventBus, Event, EventBus};
use nrss::store::memory::MemoryStore;
use nrss::store::KvStore;
use nrss::testing::{MockCatalog, RecordingPacer};
use nrss::App;
use nrss::Result;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub app: App,
    pub catalog: Arc<MockCatalog>,
    pub pacer: Arc<RecordingPacer>,
    pub bus: Arc<ChannelEventBus>,
    pub store: Arc<dyn KvStore>,
}

pub fn test_config() -> Config {
    Config {
        store_backend: StoreBackend::Memory,
        nrk_fetch_batch_size: 2,
        nrk_fetch_batch_delay_ms: 10_000,
        nrk_update_batch_size: 3,
        ..Config::default()
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), MockCatalog::new())
}

pub fn harness_with(config: Config, catalog: MockCatalog) -> Harness {
    harness_with_store(config, catalog, Arc::new(MemoryStore::new()))
}

pub fn harness_with_store(config: Config, catalog: MockCatalog, store: Arc<dyn KvStore>) -> Harness {
    let catalog = Arc::new(catalog);
    let pacer = Arc::new(RecordingPacer::new());
    let bus = Arc::new(ChannelEventBus::new());
    let app = App::build(
        &config,
        store.clone(),
        catalog.clone(),
        bus.clone() as Arc<dyn EventBus>,
        pacer.clone(),
    );
    Harness {
        app,
        catalog,
        pacer,
        bus,
        store,
    }
}

impl Harness {
    /// Delivers every buffered event to the worker until none remain.
    pub async fn drain_worker(&self) -> usize {
        let mut handled = 0;
        loop {
            let events = self.bus.drain().await;
            if events.is_empty() {
                return handled;
            }
            for event in events {
                self.app.worker.handle(event).await.expect("worker event");
                handled += 1;
            }
        }
    }

    pub async fn kicks_pending(&self) -> usize {
        self.bus
            .drain()
            .await
            .into_iter()
            .filter(|event| *event == Event::QueueKick)
            .count()
    }
}

/// [`MemoryStore`] with injectable write failures.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing_set_prefix: Option<&'static str>,
    lose_removals: bool,
}

impl FaultyStore {
    /// Plain `set` fails for keys starting with `prefix`.
    pub fn failing_sets(prefix: &'static str) -> Self {
        Self {
            failing_set_prefix: Some(prefix),
            ..Self::default()
        }
    }

    /// Sorted-set removal always reports that nothing was removed.
    pub fn losing_removals() -> Self {
        Self {
            lose_removals: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.failing_set_prefix.map_or(false, |prefix| key.starts_with(prefix)) {
            return Err(NrssError::StoreError(format!("write to {} refused", key)));
        }
        self.inner.set(key, value).await
    }
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set_ex(key, value, ttl).await
    }
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.inner.set_nx_ex(key, value, ttl).await
    }
    async fn del(&self, key: &str) -> Result<bool> {
        self.inner.del(key).await
    }
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        self.inner.del_if_eq(key, expected).await
    }
    async fn zadd_nx(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        self.inner.zadd_nx(key, member, score).await
    }
    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        if self.lose_removals {
            return Ok(false);
        }
        self.inner.zrem(key, member).await
    }
    async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        self.inner.zrank(key, member).await
    }
    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>> {
        self.inner.zrange_with_scores(key, start, stop).await
    }
    async fn zcard(&self, key: &str) -> Result<u64> {
        self.inner.zcard(key).await
    }
}
