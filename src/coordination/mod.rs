//! Cross-process coordination primitives built on [`KvStore`](crate::store::KvStore).
//!
//! Nothing here keeps in-process shared state: every decision is a single
//! atomic store command (set-if-absent, add-if-absent, compare-and-delete),
//! and every record carries a TTL as its only forced-release mechanism.

pub mod cooldown;
pub mod fetch_lock;
pub mod keys;
pub mod kick;
pub mod progress;
pub mod queue;

pub use cooldown::FetchCooldown;
pub use fetch_lock::FetchLock;
pub use kick::KickLock;
pub use progress::{ProgressRecord, ProgressStatus, ProgressTracker};
pub use queue::{ActiveClaim, Claim, EnqueueResult, QueuedItem, WorkQueue};

/// Fresh random token identifying one lock or claim holder.
pub fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
