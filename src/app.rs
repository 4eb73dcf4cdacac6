//! Wires every service from one [`Config`] and one store handle.

use crate::admin::Admin;
use crate::backfill::Backfill;
use crate::cache::{SeriesCache, SeriesStore};
use crate::catalog::{CatalogClient, NrkClient};
use crate::config::{Config, StoreBackend};
use crate::coordination::{FetchCooldown, FetchLock, KickLock, ProgressTracker, WorkQueue};
use crate::error::Result;
use crate::events::{ChannelEventBus, EventBus, RedisEventBus};
use crate::feed::FeedService;
use crate::orchestrator::{FetchOrchestrator, Pacer, TokioPacer};
use crate::store::{self, KvStore};
use crate::worker::Worker;
use log::info;
use std::sync::Arc;

pub struct App {
    pub store: Arc<dyn KvStore>,
    pub events: Arc<dyn EventBus>,
    pub catalog: Arc<dyn CatalogClient>,
    pub queue: WorkQueue,
    pub progress: ProgressTracker,
    pub series_store: SeriesStore,
    pub orchestrator: Arc<FetchOrchestrator>,
    pub cache: Arc<SeriesCache>,
    pub feed: Arc<FeedService>,
    pub worker: Arc<Worker>,
    pub admin: Admin,
}

impl App {
    /// Connects the configured store, event bus and NRK client.
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = store::connect(config).await?;
        let events: Arc<dyn EventBus> = match config.store_backend {
            StoreBackend::Redis => Arc::new(RedisEventBus::connect(&config.redis_url, &config.events_key).await?),
            StoreBackend::Memory => Arc::new(ChannelEventBus::new()),
        };
        let catalog = Arc::new(NrkClient::from_config(config)?);
        info!("🔧 Services wired ({:?} backend)", config.store_backend);
        Ok(Self::build(config, store, catalog, events, Arc::new(TokioPacer)))
    }

    pub fn build(
        config: &Config,
        store: Arc<dyn KvStore>,
        catalog: Arc<dyn CatalogClient>,
        events: Arc<dyn EventBus>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        let queue = WorkQueue::new(store.clone(), config.claim_ttl());
        let kick = KickLock::new(store.clone(), config.kick_ttl());
        let fetch_lock = FetchLock::new(store.clone(), config.fetch_lock_ttl());
        let cooldown = FetchCooldown::new(store.clone(), config.fetch_cooldown());
        let progress = ProgressTracker::new(store.clone(), config.progress_ttl());
        let series_store = SeriesStore::new(store.clone(), config.max_series_bytes);

        let orchestrator = Arc::new(FetchOrchestrator::new(
            catalog.clone(),
            series_store.clone(),
            progress.clone(),
            pacer,
            config.nrk_fetch_batch_size,
            config.batch_delay(),
        ));
        let cache = Arc::new(SeriesCache::new(
            series_store.clone(),
            catalog.clone(),
            orchestrator.clone(),
            config.sync_interval(),
            config.nrk_update_batch_size,
        ));
        let feed = Arc::new(FeedService::new(
            cache.clone(),
            queue.clone(),
            fetch_lock.clone(),
            cooldown,
            kick.clone(),
            progress.clone(),
            events.clone(),
        ));
        let worker = Arc::new(Worker::new(
            queue.clone(),
            kick.clone(),
            fetch_lock,
            progress.clone(),
            series_store.clone(),
            orchestrator.clone(),
            events.clone(),
            config.sync_interval(),
            config.series_fetch_concurrency,
        ));
        let admin = Admin::new(queue.clone(), kick, progress.clone(), events.clone());

        Self {
            store,
            events,
            catalog,
            queue,
            progress,
            series_store,
            orchestrator,
            cache,
            feed,
            worker,
            admin,
        }
    }

    pub fn backfill(&self) -> Backfill {
        Backfill::new(
            self.queue.clone(),
            self.progress.clone(),
            self.series_store.clone(),
            self.catalog.clone(),
            self.feed.clone(),
        )
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.disconnect().await
    }
}
