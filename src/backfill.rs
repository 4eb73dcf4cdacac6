//! Bulk enqueue of series ids, priority list first.

use crate::cache::SeriesStore;
use crate::catalog::CatalogClient;
use crate::coordination::{ProgressRecord, ProgressTracker, WorkQueue};
use crate::error::{NrssError, Result};
use crate::feed::FeedService;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub enqueued: usize,
    pub already_queued: usize,
    /// Ids left out because a snapshot already exists.
    pub skipped: usize,
}

/// Reads a JSON array of series ids. A missing file is an empty list.
pub fn load_priority_ids(path: &Path) -> Result<Vec<String>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Priority file {} not found; continuing without it", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(NrssError::ConfigError(format!(
                "cannot read priority file {}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| NrssError::ParseError(format!("priority file {}: {}", path.display(), e)))
}

/// Concatenates id lists, dropping blanks and later duplicates.
pub fn merge_ids<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Priority ids first, then the rest of the catalog listing. With
/// `priority_only` the catalog is ignored.
pub fn order_ids(priority: Vec<String>, catalog_ids: Vec<String>, priority_only: bool) -> Vec<String> {
    if priority_only {
        return merge_ids([priority]);
    }
    merge_ids([priority, catalog_ids])
}

pub struct Backfill {
    queue: WorkQueue,
    progress: ProgressTracker,
    series_store: SeriesStore,
    catalog: Arc<dyn CatalogClient>,
    feed: Arc<FeedService>,
    skip_existing: bool,
}

impl Backfill {
    pub fn new(
        queue: WorkQueue,
        progress: ProgressTracker,
        series_store: SeriesStore,
        catalog: Arc<dyn CatalogClient>,
        feed: Arc<FeedService>,
    ) -> Self {
        Self {
            queue,
            progress,
            series_store,
            catalog,
            feed,
            skip_existing: true,
        }
    }

    /// Also enqueue ids that already have a stored snapshot.
    pub fn include_existing(mut self, include: bool) -> Self {
        self.skip_existing = !include;
        self
    }

    /// Ids to backfill. Explicit ids follow the priority list; without them the
    /// whole NRK podcast catalog is listed behind the priority list.
    pub async fn select_ids(
        &self,
        priority: Vec<String>,
        explicit: Vec<String>,
        priority_only: bool,
    ) -> Result<Vec<String>> {
        if !explicit.is_empty() {
            return Ok(merge_ids([priority, explicit]));
        }
        if priority_only {
            info!("Priority-only mode: {} series", priority.len());
            return Ok(order_ids(priority, Vec::new(), true));
        }
        let listed = self.catalog.list_podcast_ids().await?;
        Ok(order_ids(priority, listed, false))
    }

    /// Enqueues `ids` in order, then sends at most one kick.
    pub async fn run(&self, ids: &[String]) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        for id in ids {
            if self.skip_existing && self.series_store.read(id).await?.is_some() {
                report.skipped += 1;
                continue;
            }
            let result = self.queue.enqueue(id).await?;
            if result.enqueued {
                self.progress.write(id, &ProgressRecord::queued()).await;
                report.enqueued += 1;
                // Queue scores have millisecond resolution; ties would sort by id.
                tokio::time::sleep(Duration::from_millis(1)).await;
            } else {
                report.already_queued += 1;
            }
        }

        if report.enqueued + report.already_queued > 0 {
            self.feed.kick_if_idle().await?;
        }
        info!(
            "📚 Backfill: {} enqueued, {} already queued, {} skipped",
            report.enqueued, report.already_queued, report.skipped
        );
        Ok(report)
    }
}
