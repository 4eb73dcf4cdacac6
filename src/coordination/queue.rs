//! Dedup FIFO of series awaiting backfill, plus the single active-claim slot.
//!
//! Queue membership lives in a sorted set scored by enqueue time (ties broken by
//! member). At most one item is being processed at any instant: the one named by
//! the active claim. Claim creation and member removal are two commands; the
//! claim is rolled back whenever the removal loses a race.

use super::{keys, new_token};
use crate::error::{NrssError, Result};
use crate::store::KvStore;
use crate::utils::{score_for, time_from_score};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveClaim {
    pub series_id: String,
    pub token: String,
    pub claimed_at: DateTime<Utc>,
}

/// Handle returned to the worker that owns the active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub series_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueResult {
    pub enqueued: bool,
    /// 0 when the series is the active claim, otherwise its 1-based queue rank.
    pub position: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedItem {
    pub series_id: String,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WorkQueue {
    store: Arc<dyn KvStore>,
    claim_ttl: Duration,
}

impl WorkQueue {
    pub fn new(store: Arc<dyn KvStore>, claim_ttl: Duration) -> Self {
        Self { store, claim_ttl }
    }

    /// Current claim plus the raw stored value it was parsed from.
    async fn read_claim(&self) -> Result<Option<(ActiveClaim, String)>> {
        let Some(raw) = self.store.get(keys::SERIES_QUEUE_ACTIVE).await? else {
            return Ok(None);
        };
        let claim = serde_json::from_str::<ActiveClaim>(&raw)
            .map_err(|e| NrssError::ParseError(format!("active queue claim: {}", e)))?;
        Ok(Some((claim, raw)))
    }

    pub async fn active_claim(&self) -> Result<Option<ActiveClaim>> {
        Ok(self.read_claim().await?.map(|(claim, _)| claim))
    }

    pub async fn enqueue(&self, series_id: &str) -> Result<EnqueueResult> {
        if let Some(active) = self.active_claim().await? {
            if active.series_id == series_id {
                return Ok(EnqueueResult {
                    enqueued: false,
                    position: 0,
                });
            }
        }

        let enqueued = self
            .store
            .zadd_nx(keys::SERIES_QUEUE, series_id, score_for(Utc::now()))
            .await?;
        // A claim may take the item between the add and this read; it then reports 0.
        let position = self.position(series_id).await?.unwrap_or(0);
        if enqueued {
            info!("📥 Enqueued {} at position {}", series_id, position);
        } else {
            debug!("{} already queued at position {}", series_id, position);
        }
        Ok(EnqueueResult { enqueued, position })
    }

    /// 0 for the active claim, 1-based rank when queued, `None` otherwise.
    pub async fn position(&self, series_id: &str) -> Result<Option<u64>> {
        if let Some(active) = self.active_claim().await? {
            if active.series_id == series_id {
                return Ok(Some(0));
            }
        }
        Ok(self
            .store
            .zrank(keys::SERIES_QUEUE, series_id)
            .await?
            .map(|rank| rank + 1))
    }

    /// Claims the oldest queued series, or `None` while another claim is active
    /// or the queue is empty.
    pub async fn claim_next(&self) -> Result<Option<Claim>> {
        if let Some(active) = self.active_claim().await? {
            debug!("Queue busy with {}; nothing claimed", active.series_id);
            return Ok(None);
        }

        let head = self.store.zrange_with_scores(keys::SERIES_QUEUE, 0, 0).await?;
        let Some((series_id, _)) = head.into_iter().next() else {
            return Ok(None);
        };

        let token = new_token();
        let claim = ActiveClaim {
            series_id: series_id.clone(),
            token: token.clone(),
            claimed_at: Utc::now(),
        };
        let raw = serde_json::to_string(&claim)?;
        if !self
            .store
            .set_nx_ex(keys::SERIES_QUEUE_ACTIVE, &raw, self.claim_ttl)
            .await?
        {
            debug!("Another worker claimed the queue first");
            return Ok(None);
        }

        let removed = match self.store.zrem(keys::SERIES_QUEUE, &series_id).await {
            Ok(removed) => removed,
            Err(e) => {
                self.finalize(&series_id, &token, false).await;
                return Err(e);
            }
        };
        if !removed {
            warn!("Lost race removing {} from queue; rolling back claim", series_id);
            self.finalize(&series_id, &token, false).await;
            return Ok(None);
        }

        info!("🎯 Claimed {} from queue", series_id);
        Ok(Some(Claim { series_id, token }))
    }

    /// Clears the active claim when both id and token still match, then optionally
    /// puts the series back at the tail of the queue.
    ///
    /// Returns whether the claim was cleared. Store failures are logged.
    pub async fn finalize(&self, series_id: &str, token: &str, requeue: bool) -> bool {
        let cleared = match self.read_claim().await {
            Ok(Some((claim, raw))) if claim.series_id == series_id && claim.token == token => {
                match self.store.del_if_eq(keys::SERIES_QUEUE_ACTIVE, &raw).await {
                    Ok(cleared) => cleared,
                    Err(e) => {
                        warn!("Failed to clear claim for {}: {}", series_id, e);
                        false
                    }
                }
            }
            Ok(Some((claim, _))) => {
                info!(
                    "Ignoring stale finalize for {}; active claim belongs to {}",
                    series_id, claim.series_id
                );
                false
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read active claim while finalizing {}: {}", series_id, e);
                false
            }
        };

        if requeue {
            match self
                .store
                .zadd_nx(keys::SERIES_QUEUE, series_id, score_for(Utc::now()))
                .await
            {
                Ok(_) => info!("🔁 Requeued {}", series_id),
                Err(e) => warn!("Failed to requeue {}: {}", series_id, e),
            }
        }

        if cleared {
            debug!("Finalized claim for {}", series_id);
        }
        cleared
    }

    pub async fn has_items(&self) -> Result<bool> {
        Ok(self.len().await? > 0)
    }

    pub async fn len(&self) -> Result<u64> {
        self.store.zcard(keys::SERIES_QUEUE).await
    }

    /// Every queued series in processing order.
    pub async fn list(&self) -> Result<Vec<QueuedItem>> {
        let members = self.store.zrange_with_scores(keys::SERIES_QUEUE, 0, -1).await?;
        Ok(members
            .into_iter()
            .map(|(series_id, score)| QueuedItem {
                series_id,
                enqueued_at: time_from_score(score),
            })
            .collect())
    }

    /// Drops the active claim regardless of owner. Operator escape hatch.
    pub async fn force_clear_claim(&self) -> Result<bool> {
        self.store.del(keys::SERIES_QUEUE_ACTIVE).await
    }
}
