//! Collapses racing "process more" signals into a single continuation.

use super::{keys, new_token};
use crate::store::KvStore;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct KickLock {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl KickLock {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// `true` for exactly one caller until the lock expires or is cleared.
    ///
    /// The winner is committed to emitting the continuation signal.
    pub async fn acquire(&self) -> bool {
        match self.store.set_nx_ex(keys::SERIES_QUEUE_KICK, &new_token(), self.ttl).await {
            Ok(won) => {
                debug!("Kick lock {}", if won { "acquired" } else { "already held" });
                won
            }
            Err(e) => {
                warn!("Failed to acquire queue kick lock: {}", e);
                false
            }
        }
    }

    /// Called once a continuation signal has been delivered to a worker.
    pub async fn clear(&self) -> bool {
        match self.store.del(keys::SERIES_QUEUE_KICK).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to clear queue kick lock: {}", e);
                false
            }
        }
    }

    pub async fn is_held(&self) -> bool {
        match self.store.get(keys::SERIES_QUEUE_KICK).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                warn!("Failed to read queue kick lock: {}", e);
                false
            }
        }
    }
}
