//! Event consumer: on-demand fetches and the one-item-per-kick queue drain.

use crate::cache::SeriesStore;
use crate::coordination::{FetchLock, KickLock, ProgressRecord, ProgressTracker, WorkQueue};
use crate::error::{NrssError, Result};
use crate::events::{Event, EventBus};
use crate::orchestrator::{FetchOrchestrator, FetchOutcome};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const UNEXPECTED_MESSAGE: &str = "Unexpected error while fetching series";
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one queue-kick invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KickOutcome {
    pub processed: usize,
    pub series_id: Option<String>,
    /// Whether this invocation emitted the continuation signal.
    pub chained: bool,
}

pub struct Worker {
    queue: WorkQueue,
    kick: KickLock,
    fetch_lock: FetchLock,
    progress: ProgressTracker,
    series_store: SeriesStore,
    orchestrator: Arc<FetchOrchestrator>,
    events: Arc<dyn EventBus>,
    sync_interval: Duration,
    /// Bounds concurrent on-demand fetches across all spawned event handlers.
    fetch_permits: Semaphore,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: WorkQueue,
        kick: KickLock,
        fetch_lock: FetchLock,
        progress: ProgressTracker,
        series_store: SeriesStore,
        orchestrator: Arc<FetchOrchestrator>,
        events: Arc<dyn EventBus>,
        sync_interval: Duration,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            queue,
            kick,
            fetch_lock,
            progress,
            series_store,
            orchestrator,
            events,
            sync_interval,
            fetch_permits: Semaphore::new(fetch_concurrency.max(1)),
        }
    }

    pub async fn handle(&self, event: Event) -> Result<()> {
        match event {
            Event::SeriesFetch { series_id, lock_token } => {
                self.handle_series_fetch(&series_id, lock_token.as_deref()).await?;
            }
            Event::QueueKick => {
                let outcome = self.process_queue_kick().await?;
                debug!("Queue kick outcome: {:?}", outcome);
            }
        }
        Ok(())
    }

    /// Runs an on-demand fetch, then releases the fetch lock it was triggered under.
    ///
    /// Waits for a fetch permit first. A redelivered event whose series was
    /// already stored fresh is skipped.
    pub async fn handle_series_fetch(&self, series_id: &str, lock_token: Option<&str>) -> Result<Option<FetchOutcome>> {
        let _permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|e| NrssError::Unexpected(format!("fetch permits closed: {}", e)))?;
        debug!("Fetch permit taken for {}", series_id);

        let fresh = match self.series_store.read(series_id).await {
            Ok(Some(existing)) => !existing.is_stale_at(Utc::now(), self.sync_interval),
            Ok(None) => false,
            Err(e) => {
                warn!("Could not check existing snapshot for {}: {}", series_id, e);
                false
            }
        };

        let result = if fresh {
            info!("Skipping fetch for {}; snapshot already fresh", series_id);
            Ok(None)
        } else {
            self.run_isolated(series_id).await.map(Some)
        };

        if let Some(token) = lock_token {
            self.fetch_lock.release(series_id, token).await;
        }

        if let Err(e) = &result {
            error!("Fetch for {} aborted: {}", series_id, e);
            self.progress
                .write(series_id, &ProgressRecord::failed(UNEXPECTED_MESSAGE))
                .await;
        }
        result
    }

    /// Claims and fully processes at most one queued series, then chains a single
    /// continuation if more remain.
    pub async fn process_queue_kick(&self) -> Result<KickOutcome> {
        // This invocation is the delivered signal; let the next one be committed.
        self.kick.clear().await;

        let Some(claim) = self.queue.claim_next().await? else {
            debug!("Queue kick found nothing to claim");
            return Ok(KickOutcome::default());
        };

        match self.run_isolated(&claim.series_id).await {
            Ok(FetchOutcome::Stored(series)) => {
                info!("Queue processed {} ({} episodes)", claim.series_id, series.episodes.len());
            }
            Ok(FetchOutcome::Failed(reason)) => {
                warn!("Queue item {} failed: {}", claim.series_id, reason);
            }
            Err(e) => {
                // Dropped rather than retried so the queue keeps moving.
                error!("Unexpected error processing {}: {}", claim.series_id, e);
                self.progress
                    .write(&claim.series_id, &ProgressRecord::failed(UNEXPECTED_MESSAGE))
                    .await;
            }
        }
        self.queue.finalize(&claim.series_id, &claim.token, false).await;

        let chained = self.chain().await;
        Ok(KickOutcome {
            processed: 1,
            series_id: Some(claim.series_id),
            chained,
        })
    }

    /// Emits one continuation when items remain and this caller wins the kick lock.
    async fn chain(&self) -> bool {
        match self.queue.has_items().await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("Could not check queue length: {}", e);
                return false;
            }
        }
        if !self.kick.acquire().await {
            return false;
        }
        match self.events.send(Event::QueueKick).await {
            Ok(()) => {
                info!("➡️ Chained queue kick");
                true
            }
            Err(e) => {
                warn!("Failed to send queue kick: {}", e);
                self.kick.clear().await;
                false
            }
        }
    }

    /// Runs the orchestrator on its own task so a panic is contained and reported
    /// as an unexpected error.
    async fn run_isolated(&self, series_id: &str) -> Result<FetchOutcome> {
        let orchestrator = self.orchestrator.clone();
        let id = series_id.to_string();
        tokio::spawn(async move { orchestrator.run(&id).await })
            .await
            .map_err(|e| NrssError::Unexpected(format!("fetch task for {} did not complete: {}", series_id, e)))?
    }

    /// Kicks the queue if it holds items but nothing is claimed, e.g. after a
    /// kick signal was lost.
    pub async fn recover(&self) -> Result<bool> {
        if !self.queue.has_items().await? || self.queue.active_claim().await?.is_some() {
            return Ok(false);
        }
        if !self.kick.acquire().await {
            return Ok(false);
        }
        self.events.send(Event::QueueKick).await?;
        info!("Recovered idle queue with a kick");
        Ok(true)
    }

    /// Consumes events until the bus fails irrecoverably. Each event is handled on
    /// its own task; coordination between them goes through the store.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        if let Err(e) = self.recover().await {
            warn!("Queue recovery check failed: {}", e);
        }
        info!("👷 Worker listening for events");
        loop {
            match self.events.recv(POLL_INTERVAL).await {
                Ok(Some(event)) => {
                    let worker = self.clone();
                    tokio::spawn(async move {
                        let name = event.name();
                        if let Err(e) = worker.handle(event).await {
                            error!("Handling {} failed: {}", name, e);
                        }
                    });
                }
                Ok(None) => {}
                Err(e) if e.is_recoverable() => {
                    warn!("Event receive failed ({:?}): {}; retrying", e.categorize(), e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!("Event loop stopping ({:?}): {}", e.categorize(), e);
                    return Err(e);
                }
            }
        }
    }
}
