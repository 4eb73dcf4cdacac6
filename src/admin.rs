//! Operator view of the backfill queue and its escape hatch.

use crate::coordination::{ActiveClaim, KickLock, ProgressRecord, ProgressTracker, QueuedItem, WorkQueue};
use crate::error::Result;
use crate::events::{Event, EventBus};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub active: Option<ActiveClaim>,
    pub active_progress: Option<ProgressRecord>,
    pub queued: Vec<QueuedItem>,
    pub kick_lock_held: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnblockResult {
    /// Whether a claim or a kick lock was removed.
    pub cleared: bool,
    pub queue_length: u64,
    pub kicked: bool,
}

pub struct Admin {
    queue: WorkQueue,
    kick: KickLock,
    progress: ProgressTracker,
    events: Arc<dyn EventBus>,
}

impl Admin {
    pub fn new(queue: WorkQueue, kick: KickLock, progress: ProgressTracker, events: Arc<dyn EventBus>) -> Self {
        Self {
            queue,
            kick,
            progress,
            events,
        }
    }

    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let active = self.queue.active_claim().await?;
        let active_progress = match &active {
            Some(claim) => self.progress.read(&claim.series_id).await?,
            None => None,
        };
        Ok(QueueStatus {
            active,
            active_progress,
            queued: self.queue.list().await?,
            kick_lock_held: self.kick.is_held().await,
        })
    }

    /// Forcibly drops the active claim and the kick lock, then restarts the
    /// drain if anything is still queued.
    pub async fn unblock(&self) -> Result<UnblockResult> {
        let cleared_claim = self.queue.force_clear_claim().await?;
        let cleared_kick = self.kick.clear().await;
        let queue_length = self.queue.len().await?;

        let mut kicked = false;
        if queue_length > 0 && self.kick.acquire().await {
            match self.events.send(Event::QueueKick).await {
                Ok(()) => kicked = true,
                Err(e) => {
                    warn!("Unblock could not send queue kick: {}", e);
                    self.kick.clear().await;
                }
            }
        }

        info!(
            "🔓 Unblocked queue (claim cleared: {}, kick cleared: {}, {} queued)",
            cleared_claim, cleared_kick, queue_length
        );
        Ok(UnblockResult {
            cleared: cleared_claim || cleared_kick,
            queue_length,
            kicked,
        })
    }
}
