//! At most one on-demand fetch trigger per series per cooldown window.

use super::{keys, new_token};
use crate::store::KvStore;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct FetchCooldown {
    store: Arc<dyn KvStore>,
    window: Option<Duration>,
}

impl FetchCooldown {
    /// `None` disables the cooldown.
    pub fn new(store: Arc<dyn KvStore>, window: Option<Duration>) -> Self {
        Self { store, window }
    }

    /// Starts a cooldown window for `series_id`. `false` while one is running.
    ///
    /// Store failures let the trigger through; the fetch lock still keeps it single-flight.
    pub async fn try_start(&self, series_id: &str) -> bool {
        let Some(window) = self.window else {
            return true;
        };
        match self
            .store
            .set_nx_ex(&keys::series_fetch_rate(series_id), &new_token(), window)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                debug!("Fetch for {} is cooling down", series_id);
                false
            }
            Err(e) => {
                warn!("Failed to check fetch cooldown for {}: {}", series_id, e);
                true
            }
        }
    }
}
