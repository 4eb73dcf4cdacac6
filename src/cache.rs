// src/cache.rs
//! Series snapshot persistence and the staleness-driven read path.

use crate::catalog::CatalogClient;
use crate::coordination::keys;
use crate::error::Result;
use crate::model::Series;
use crate::orchestrator::{FetchOrchestrator, FetchOutcome};
use crate::store::KvStore;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// What a read does when no snapshot is stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMissMode {
    /// Run a full fetch inline and return its result.
    #[default]
    Fetch,
    /// Return `None` immediately; the caller schedules the fetch.
    Trigger,
}

/// Reads and writes whole snapshots under `series:{id}`, enforcing the byte budget.
#[derive(Clone)]
pub struct SeriesStore {
    store: Arc<dyn KvStore>,
    max_bytes: usize,
}

impl SeriesStore {
    pub fn new(store: Arc<dyn KvStore>, max_bytes: usize) -> Self {
        Self { store, max_bytes }
    }

    /// Unreadable snapshots are treated as absent.
    pub async fn read(&self, series_id: &str) -> Result<Option<Series>> {
        let Some(raw) = self.store.get(&keys::series(series_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Series>(&raw) {
            Ok(series) => Ok(Some(series)),
            Err(e) => {
                warn!("Discarding unreadable snapshot for {}: {}", series_id, e);
                Ok(None)
            }
        }
    }

    /// Trims to the byte budget and writes the snapshot whole.
    ///
    /// Returns the stored snapshot and whether the write succeeded. Store failures
    /// are logged, never propagated.
    pub async fn write(&self, mut series: Series) -> (Series, bool) {
        series.trim_to_size(self.max_bytes);
        let raw = match serde_json::to_string(&series) {
            Ok(raw) => raw,
            Err(e) => {
                error!("writeSeries failed to serialize {}: {}", series.id, e);
                return (series, false);
            }
        };
        match self.store.set(&keys::series(&series.id), &raw).await {
            Ok(()) => {
                info!("💾 Wrote series: {} ({} episodes)", series.id, series.episodes.len());
                (series, true)
            }
            Err(e) => {
                error!("writeSeries failed: {}: {}", series.id, e);
                (series, false)
            }
        }
    }
}

pub struct SeriesCache {
    series_store: SeriesStore,
    catalog: Arc<dyn CatalogClient>,
    orchestrator: Arc<FetchOrchestrator>,
    sync_interval: Duration,
    update_batch_size: usize,
}

impl SeriesCache {
    pub fn new(
        series_store: SeriesStore,
        catalog: Arc<dyn CatalogClient>,
        orchestrator: Arc<FetchOrchestrator>,
        sync_interval: Duration,
        update_batch_size: usize,
    ) -> Self {
        Self {
            series_store,
            catalog,
            orchestrator,
            sync_interval,
            update_batch_size: update_batch_size.max(1),
        }
    }

    pub fn is_stale(&self, series: &Series) -> bool {
        series.is_stale_at(Utc::now(), self.sync_interval)
    }

    pub async fn get_series(&self, series_id: &str, mode: CacheMissMode) -> Result<Option<Series>> {
        let Some(stored) = self.series_store.read(series_id).await? else {
            return match mode {
                CacheMissMode::Trigger => {
                    debug!("Miss for {}; fetch left to caller", series_id);
                    Ok(None)
                }
                CacheMissMode::Fetch => self.initial_fetch(series_id).await,
            };
        };

        if !self.is_stale(&stored) {
            debug!("Hit: {}", series_id);
            return Ok(Some(stored));
        }
        info!("Stale, re-fetching: {}", series_id);
        Ok(Some(self.refresh(stored).await))
    }

    async fn initial_fetch(&self, series_id: &str) -> Result<Option<Series>> {
        info!("Miss, fetching from NRK: {}", series_id);
        match self.orchestrator.run(series_id).await? {
            FetchOutcome::Stored(series) => Ok(Some(series)),
            FetchOutcome::Failed(reason) => {
                warn!("NRK returned no usable data for {}: {}", series_id, reason);
                Ok(None)
            }
        }
    }

    /// Incremental refresh: fetches only unknown episodes and merges them in front.
    ///
    /// Any upstream failure, or finding nothing new, returns `existing` unchanged
    /// without a write.
    pub async fn refresh(&self, existing: Series) -> Series {
        let known: HashSet<String> = existing.episodes.iter().map(|ep| ep.id.clone()).collect();
        let updates = match self.catalog.fetch_catalog_updates(&existing.id, &known).await {
            Ok(Some(updates)) => updates,
            Ok(None) => {
                warn!("No update data from NRK for {}", existing.id);
                return existing;
            }
            Err(e) => {
                warn!("Incremental fetch failed for {}: {}", existing.id, e);
                return existing;
            }
        };

        let mut new_episodes = Vec::new();
        for batch in updates.entries.chunks(self.update_batch_size) {
            new_episodes.extend(self.catalog.resolve_playback_batch(batch, updates.kind).await);
        }
        new_episodes.retain(|ep| !known.contains(&ep.id));
        if new_episodes.is_empty() {
            debug!("No new episodes for {}", existing.id);
            return existing;
        }

        info!("Found {} new episodes for {}", new_episodes.len(), existing.id);
        let mut updated = existing;
        new_episodes.append(&mut updated.episodes);
        updated.episodes = new_episodes;
        updated.last_fetched_at = Utc::now();
        updated.sort_episodes();

        let (stored, ok) = self.series_store.write(updated).await;
        if !ok {
            warn!("Failed to persist after update: {}", stored.id);
        }
        stored
    }
}
