//! Shared key-value store: the single source of coordination truth.
//!
//! Every lock, claim, queue and progress record lives behind [`KvStore`].
//! Operations are individually atomic; nothing here assumes a cross-key
//! transaction. Two adapters exist and one is picked at startup by
//! [`connect`].

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Set-if-absent with expiry. `true` when this call created the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// `true` when a key was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Atomic compare-and-delete: removes `key` only while it still holds `expected`.
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool>;

    /// Add-if-absent to a sorted set. `true` when the member was added.
    async fn zadd_nx(&self, key: &str, member: &str, score: f64) -> Result<bool>;

    /// `true` when the member was present and removed.
    async fn zrem(&self, key: &str, member: &str) -> Result<bool>;

    /// 0-based rank in `(score, member)` order.
    async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>>;

    /// Inclusive range by rank; negative indices count from the end like Redis.
    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>>;

    async fn zcard(&self, key: &str) -> Result<u64>;

    /// Releases the underlying connection. Later calls fail with `StoreDisconnected`.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Creates the process-wide store handle selected by `STORE_BACKEND`.
pub async fn connect(config: &Config) -> Result<Arc<dyn KvStore>> {
    match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-process memory store; coordination is limited to this process");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
