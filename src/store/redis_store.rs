// src/store/redis_store.rs
//! Redis adapter for [`KvStore`].

use super::KvStore;
use crate::error::{NrssError, Result};
use async_trait::async_trait;
use log::{debug, error, info};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Uses a `ConnectionManager` for automatic reconnection. The manager is
/// dropped on [`KvStore::disconnect`].
pub struct RedisStore {
    conn_manager: RwLock<Option<ConnectionManager>>,
    compare_and_delete: Script,
    redis_url: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("redis_url", &self.redis_url)
            .field("conn_manager", &"<ConnectionManager instance>")
            .finish()
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Initializing Redis connection manager for URL: {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            NrssError::StoreError(format!("Failed to create Redis ConnectionManager: {}", e))
        })?;
        info!("Redis ConnectionManager initialized successfully");
        Ok(Self {
            conn_manager: RwLock::new(Some(conn_manager)),
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            redis_url: redis_url.to_string(),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager> {
        self.conn_manager
            .read()
            .await
            .clone()
            .ok_or(NrssError::StoreDisconnected)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let value = conn.get::<_, Option<String>>(key).await?;
        debug!("Redis GET {} -> {}", key, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn().await?;
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed = conn.del::<_, i64>(key).await?;
        Ok(removed > 0)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn zadd_nx(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let added = redis::cmd("ZADD")
            .arg(key)
            .arg("NX")
            .arg(score)
            .arg(member)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(added > 0)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed = conn.zrem::<_, _, i64>(key, member).await?;
        Ok(removed > 0)
    }

    async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        let mut conn = self.conn().await?;
        let rank = conn.zrank::<_, _, Option<u64>>(key, member).await?;
        Ok(rank)
    }

    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn().await?;
        let members = conn
            .zrange_withscores::<_, Vec<(String, f64)>>(key, start, stop)
            .await?;
        Ok(members)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        let count = conn.zcard::<_, u64>(key).await?;
        Ok(count)
    }

    async fn disconnect(&self) -> Result<()> {
        if self.conn_manager.write().await.take().is_some() {
            info!("Redis connection manager released for URL: {}", self.redis_url);
        }
        Ok(())
    }
}
