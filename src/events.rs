//! Fire-and-forget trigger channel between request handlers and workers.
//!
//! Delivery is at-least-once; every consumer tolerates duplicates.

use crate::error::{NrssError, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub const SERIES_FETCH: &str = "nrss/series.fetch";
pub const SERIES_QUEUE_KICK: &str = "nrss/series.queue.kick";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum Event {
    /// Fetch one series on demand. Carries the fetch lock token so the handler can release it.
    #[serde(rename = "nrss/series.fetch", rename_all = "camelCase")]
    SeriesFetch {
        series_id: String,
        #[serde(default)]
        lock_token: Option<String>,
    },
    /// Process the next queued series.
    #[serde(rename = "nrss/series.queue.kick")]
    QueueKick,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SeriesFetch { .. } => SERIES_FETCH,
            Event::QueueKick => SERIES_QUEUE_KICK,
        }
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn send(&self, event: Event) -> Result<()>;

    /// Waits up to `timeout` for the next event.
    async fn recv(&self, timeout: Duration) -> Result<Option<Event>>;
}

/// In-process bus over an unbounded tokio channel.
pub struct ChannelEventBus {
    tx: mpsc::UnboundedSender<Event>,
    rx: Mutex<mpsc::UnboundedReceiver<Event>>,
}

impl ChannelEventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Mutex::new(rx) }
    }

    /// Everything currently buffered, without waiting.
    pub async fn drain(&self) -> Vec<Event> {
        let mut rx = self.rx.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for ChannelEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for ChannelEventBus {
    async fn send(&self, event: Event) -> Result<()> {
        debug!("📨 {}", event.name());
        self.tx
            .send(event)
            .map_err(|e| NrssError::EventError(format!("channel closed: {}", e)))
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Event>> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => Err(NrssError::EventError("channel closed".to_string())),
            Err(_) => Ok(None),
        }
    }
}

/// Cross-process bus over a Redis list: RPUSH to send, BLPOP to receive.
///
/// Receiving blocks its connection, so it gets one of its own.
pub struct RedisEventBus {
    key: String,
    sender: ConnectionManager,
    receiver: Mutex<MultiplexedConnection>,
}

impl RedisEventBus {
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let sender = ConnectionManager::new(client.clone()).await?;
        let receiver = client.get_multiplexed_tokio_connection().await?;
        info!("Event bus connected on list '{}'", key);
        Ok(Self {
            key: key.to_string(),
            sender,
            receiver: Mutex::new(receiver),
        })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn send(&self, event: Event) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        let mut conn = self.sender.clone();
        conn.rpush::<_, _, ()>(&self.key, payload).await?;
        debug!("📨 {} -> {}", event.name(), self.key);
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Event>> {
        let mut conn = self.receiver.lock().await;
        let reply = redis::cmd("BLPOP")
            .arg(&self.key)
            .arg(timeout.as_secs_f64().max(0.1))
            .query_async::<_, Option<(String, String)>>(&mut *conn)
            .await?;
        let Some((_, payload)) = reply else {
            return Ok(None);
        };
        match serde_json::from_str::<Event>(&payload) {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                warn!("Dropping malformed event from {}: {} ({})", self.key, e, payload);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = Event::SeriesFetch {
            series_id: "abels-taarn".to_string(),
            lock_token: Some("tok".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], SERIES_FETCH);
        assert_eq!(json["data"]["seriesId"], "abels-taarn");
        assert_eq!(json["data"]["lockToken"], "tok");

        let kick: Event = serde_json::from_str(r#"{"name":"nrss/series.queue.kick"}"#).unwrap();
        assert_eq!(kick, Event::QueueKick);
    }

    #[tokio::test]
    async fn test_channel_bus_times_out_when_empty() {
        let bus = ChannelEventBus::new();
        assert_eq!(bus.recv(Duration::from_millis(10)).await.unwrap(), None);
        bus.send(Event::QueueKick).await.unwrap();
        assert_eq!(bus.recv(Duration::from_millis(10)).await.unwrap(), Some(Event::QueueKick));
    }
}
