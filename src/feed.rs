//! Request-side entry points: serve a snapshot or schedule work for it.

use crate::cache::{CacheMissMode, SeriesCache};
use crate::coordination::{
    EnqueueResult, FetchCooldown, FetchLock, KickLock, ProgressRecord, ProgressTracker, WorkQueue,
};
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::model::Series;
use log::{info, warn};
use std::sync::Arc;

/// What a reader gets back for one series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesLookup {
    Ready(Series),
    /// Not stored yet. A fetch is either running or scheduled.
    Pending {
        progress: Option<ProgressRecord>,
        /// Queue position when the series is waiting in the backfill queue.
        position: Option<u64>,
    },
}

pub struct FeedService {
    cache: Arc<SeriesCache>,
    queue: WorkQueue,
    fetch_lock: FetchLock,
    cooldown: FetchCooldown,
    kick: KickLock,
    progress: ProgressTracker,
    events: Arc<dyn EventBus>,
}

impl FeedService {
    pub fn new(
        cache: Arc<SeriesCache>,
        queue: WorkQueue,
        fetch_lock: FetchLock,
        cooldown: FetchCooldown,
        kick: KickLock,
        progress: ProgressTracker,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            cache,
            queue,
            fetch_lock,
            cooldown,
            kick,
            progress,
            events,
        }
    }

    /// Returns the stored snapshot (refreshed when stale) or schedules a single
    /// on-demand fetch and reports it as pending.
    ///
    /// Concurrent callers for the same missing series trigger one fetch: only the
    /// Fetch Lock winner sends the event, and only once per cooldown window, so a
    /// series NRK has no data for is not refetched on every request.
    pub async fn request_series(&self, series_id: &str) -> Result<SeriesLookup> {
        if let Some(series) = self.cache.get_series(series_id, CacheMissMode::Trigger).await? {
            return Ok(SeriesLookup::Ready(series));
        }

        if let Some(position) = self.queue.position(series_id).await? {
            let progress = self.progress.read(series_id).await?;
            return Ok(SeriesLookup::Pending {
                progress,
                position: Some(position),
            });
        }

        if let Some(token) = self.fetch_lock.acquire(series_id).await? {
            if !self.cooldown.try_start(series_id).await {
                self.fetch_lock.release(series_id, &token).await;
                return Ok(SeriesLookup::Pending {
                    progress: self.progress.read(series_id).await?,
                    position: None,
                });
            }
            self.progress.write(series_id, &ProgressRecord::queued()).await;
            let event = Event::SeriesFetch {
                series_id: series_id.to_string(),
                lock_token: Some(token.clone()),
            };
            if let Err(e) = self.events.send(event).await {
                // Nobody will run the fetch, so let the next request retry.
                warn!("Failed to trigger fetch for {}: {}", series_id, e);
                self.fetch_lock.release(series_id, &token).await;
                self.progress.clear(series_id).await;
                return Err(e);
            }
            info!("🚀 Triggered on-demand fetch for {}", series_id);
        }

        Ok(SeriesLookup::Pending {
            progress: self.progress.read(series_id).await?,
            position: None,
        })
    }

    /// Adds a series to the backfill queue and makes sure a worker is draining it.
    pub async fn enqueue_series(&self, series_id: &str) -> Result<EnqueueResult> {
        let result = self.queue.enqueue(series_id).await?;
        if result.enqueued {
            self.progress.write(series_id, &ProgressRecord::queued()).await;
        }
        self.kick_if_idle().await?;
        Ok(result)
    }

    /// Sends a queue kick when nothing is claimed and this caller wins the kick lock.
    pub async fn kick_if_idle(&self) -> Result<bool> {
        if self.queue.active_claim().await?.is_some() {
            return Ok(false);
        }
        if !self.kick.acquire().await {
            return Ok(false);
        }
        if let Err(e) = self.events.send(Event::QueueKick).await {
            self.kick.clear().await;
            return Err(e);
        }
        Ok(true)
    }
}
