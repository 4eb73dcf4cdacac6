//! Per-job state machine:
//! `queued -> running(batch i/n) -> stored | failed(no_data) | failed(no_playable_episodes)`.

use super::pacing::Pacer;
use crate::cache::SeriesStore;
use crate::catalog::{build_series, Catalog, CatalogClient};
use crate::coordination::{ProgressRecord, ProgressTracker};
use crate::error::{FetchFailure, Result};
use crate::model::{Episode, Series};
use crate::utils::Timer;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Stored(Series),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, FetchOutcome::Stored(_))
    }

    pub fn episodes(&self) -> usize {
        match self {
            FetchOutcome::Stored(series) => series.episodes.len(),
            FetchOutcome::Failed(_) => 0,
        }
    }
}

pub struct FetchOrchestrator {
    catalog: Arc<dyn CatalogClient>,
    series_store: SeriesStore,
    progress: ProgressTracker,
    pacer: Arc<dyn Pacer>,
    batch_size: usize,
    batch_delay: Option<Duration>,
}

impl FetchOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        series_store: SeriesStore,
        progress: ProgressTracker,
        pacer: Arc<dyn Pacer>,
        batch_size: usize,
        batch_delay: Option<Duration>,
    ) -> Self {
        Self {
            catalog,
            series_store,
            progress,
            pacer,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Runs one full fetch for `series_id`.
    ///
    /// Terminal upstream outcomes come back as `Ok(FetchOutcome::Failed)` with a
    /// `failed` progress record left behind. `Err` only escapes when the job
    /// itself could not continue, e.g. a pacing suspension failed.
    pub async fn run(&self, series_id: &str) -> Result<FetchOutcome> {
        let timer = Timer::start(&format!("fetch {}", series_id));

        let catalog = match self.catalog.fetch_catalog(series_id).await {
            Ok(Some(catalog)) if !catalog.entries.is_empty() => catalog,
            Ok(_) => return Ok(self.fail(series_id, FetchFailure::NoData).await),
            Err(e) => {
                warn!("Catalog fetch failed for {}: {}", series_id, e);
                return Ok(self.fail(series_id, FetchFailure::NoData).await);
            }
        };

        let episodes = self.resolve_batches(series_id, &catalog).await?;
        if episodes.is_empty() {
            return Ok(self.fail(series_id, FetchFailure::NoPlayableEpisodes).await);
        }

        let (series, persisted) = self
            .series_store
            .write(build_series(&catalog.metadata, episodes))
            .await;
        if !persisted {
            warn!("Failed to persist: {}", series_id);
        }
        self.progress.clear(series_id).await;

        info!("✅ Fetched and stored: {} ({} episodes)", series_id, series.episodes.len());
        timer.finish();
        Ok(FetchOutcome::Stored(series))
    }

    /// Resolves playback batch by batch, writing progress after each one.
    ///
    /// Each progress write is a full-value upsert, so replaying a batch writes
    /// the same record again.
    async fn resolve_batches(&self, series_id: &str, catalog: &Catalog) -> Result<Vec<Episode>> {
        let total_entries = catalog.entries.len();
        let total_batches = (total_entries + self.batch_size - 1) / self.batch_size;
        let running = ProgressRecord::running(total_batches as u32, total_entries as u32);
        self.progress.write(series_id, &running).await;

        let mut episodes = Vec::with_capacity(total_entries);
        let mut completed_entries = 0;
        for (i, batch) in catalog.entries.chunks(self.batch_size).enumerate() {
            let resolved = self.catalog.resolve_playback_batch(batch, catalog.kind).await;
            info!(
                "Executed batch: {}/{} {} {} playable",
                i + 1,
                total_batches,
                series_id,
                resolved.len()
            );
            episodes.extend(resolved);
            completed_entries += batch.len();
            self.progress
                .write(series_id, &running.advanced((i + 1) as u32, completed_entries as u32))
                .await;

            if let Some(delay) = self.batch_delay {
                if i + 1 < total_batches {
                    self.pacer.pause(&format!("rate-limit-{}", i), delay).await?;
                }
            }
        }
        Ok(episodes)
    }

    async fn fail(&self, series_id: &str, reason: FetchFailure) -> FetchOutcome {
        warn!("Fetch for {} failed: {}", series_id, reason);
        self.progress
            .write(series_id, &ProgressRecord::failed(reason.as_str()))
            .await;
        FetchOutcome::Failed(reason)
    }
}
