//! Suspension between upstream batches.

use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

/// Suspends a fetch job between batches to respect upstream rate limits.
///
/// `step` names the suspension point so a durable implementation can resume a
/// job after the pause instead of re-running it from the start.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, step: &str, duration: Duration) -> Result<()>;
}

/// Suspends the current task on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, step: &str, duration: Duration) -> Result<()> {
        debug!("⏸️ {} sleeping {}ms", step, duration.as_millis());
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
