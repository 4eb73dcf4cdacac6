//! Per-series fetch progress exposed to polling clients.
//!
//! A missing record means the series is resolved; `failed` stays visible until
//! its TTL runs out.

use super::keys;
use crate::error::{NrssError, Result};
use crate::store::KvStore;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Queued,
    Running,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub status: ProgressStatus,
    pub total_batches: u32,
    pub completed_batches: u32,
    pub total_episodes: u32,
    pub completed_episodes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn queued() -> Self {
        Self {
            status: ProgressStatus::Queued,
            total_batches: 0,
            completed_batches: 0,
            total_episodes: 0,
            completed_episodes: 0,
            message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn running(total_batches: u32, total_episodes: u32) -> Self {
        Self {
            status: ProgressStatus::Running,
            total_batches,
            total_episodes,
            ..Self::queued()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Failed,
            message: Some(message.into()),
            ..Self::queued()
        }
    }

    /// Same record with completion counters advanced and a fresh timestamp.
    pub fn advanced(&self, completed_batches: u32, completed_episodes: u32) -> Self {
        Self {
            completed_batches,
            completed_episodes,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Upserts the record with a TTL so orphaned progress expires.
    pub async fn write(&self, series_id: &str, record: &ProgressRecord) -> bool {
        let raw = match serde_json::to_string(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize progress for {}: {}", series_id, e);
                return false;
            }
        };
        match self.store.set_ex(&keys::series_progress(series_id), &raw, self.ttl).await {
            Ok(()) => {
                debug!(
                    "Progress {}: {:?} {}/{} batches",
                    series_id, record.status, record.completed_batches, record.total_batches
                );
                true
            }
            Err(e) => {
                warn!("Failed to write progress for {}: {}", series_id, e);
                false
            }
        }
    }

    pub async fn read(&self, series_id: &str) -> Result<Option<ProgressRecord>> {
        let Some(raw) = self.store.get(&keys::series_progress(series_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| NrssError::ParseError(format!("progress record for {}: {}", series_id, e)))
    }

    pub async fn clear(&self, series_id: &str) -> bool {
        match self.store.del(&keys::series_progress(series_id)).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to clear progress for {}: {}", series_id, e);
                false
            }
        }
    }
}
