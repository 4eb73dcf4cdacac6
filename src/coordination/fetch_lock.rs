//! Per-series mutual exclusion for the on-demand refresh path.

use super::{keys, new_token};
use crate::error::Result;
use crate::store::KvStore;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct FetchLock {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl FetchLock {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the holder token, or `None` while another holder is active.
    pub async fn acquire(&self, series_id: &str) -> Result<Option<String>> {
        self.acquire_with_ttl(series_id, self.ttl).await
    }

    pub async fn acquire_with_ttl(&self, series_id: &str, ttl: Duration) -> Result<Option<String>> {
        let token = new_token();
        let won = self
            .store
            .set_nx_ex(&keys::series_lock(series_id), &token, ttl)
            .await?;
        if won {
            debug!("🔒 Fetch lock acquired for {} (ttl {}s)", series_id, ttl.as_secs());
            Ok(Some(token))
        } else {
            debug!("Fetch lock for {} already held", series_id);
            Ok(None)
        }
    }

    /// Releases the lock only if `token` still owns it.
    ///
    /// A holder whose lock expired and was re-acquired by someone else leaves the
    /// new holder untouched. Store failures are logged, never propagated.
    pub async fn release(&self, series_id: &str, token: &str) -> bool {
        match self.store.del_if_eq(&keys::series_lock(series_id), token).await {
            Ok(true) => {
                debug!("🔓 Fetch lock released for {}", series_id);
                true
            }
            Ok(false) => {
                info!("Fetch lock for {} no longer owned by this holder; left in place", series_id);
                false
            }
            Err(e) => {
                warn!("Failed to release fetch lock for {}: {}", series_id, e);
                false
            }
        }
    }

    pub async fn is_held(&self, series_id: &str) -> Result<bool> {
        Ok(self.store.get(&keys::series_lock(series_id)).await?.is_some())
    }
}
