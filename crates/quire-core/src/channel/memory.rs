//! In-process realtime hub

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::RealtimeChannel;
use crate::protocol::ChannelMessage;
use crate::{Error, Result};

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out hub backed by one `tokio::sync::broadcast` channel per topic.
///
/// Clients in the same process share one hub; each gets an independent
/// receiver. Lagging receivers lose the oldest frames, which is acceptable
/// for ephemeral signals. The hub can be switched offline to exercise
/// transport failures.
pub struct InMemoryHub {
    topics: Mutex<HashMap<String, broadcast::Sender<ChannelMessage>>>,
    capacity: usize,
    online: AtomicBool,
    messages_sent: AtomicU64,
}

impl InMemoryHub {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            online: AtomicBool::new(true),
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Simulate connectivity loss or recovery
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        tracing::info!(online, "Realtime hub connectivity changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Frames accepted for delivery since creation
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Current number of receivers on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .ok()
            .and_then(|topics| topics.get(topic).map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(Error::TransportUnavailable(
                "realtime hub is offline".to_string(),
            ))
        }
    }

    fn sender(&self, topic: &str) -> Result<broadcast::Sender<ChannelMessage>> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| Error::TransportUnavailable("realtime hub lock poisoned".to_string()))?;
        let capacity = self.capacity;
        Ok(topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone())
    }
}

impl Default for InMemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeChannel for InMemoryHub {
    async fn send(&self, topic: &str, message: ChannelMessage) -> Result<()> {
        self.ensure_online()?;
        let sender = self.sender(topic)?;
        // No receivers is not an error: nobody else is on the document.
        let _ = sender.send(message);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<ChannelMessage>> {
        self.ensure_online()?;
        Ok(self.sender(topic)?.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber_of_topic() {
        let hub = InMemoryHub::new();
        let mut first = hub.subscribe("note-1").await.unwrap();
        let mut second = hub.subscribe("note-1").await.unwrap();
        let mut other = hub.subscribe("note-2").await.unwrap();

        hub.send("note-1", ChannelMessage::new("user-typing", json!({})))
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap().event, "user-typing");
        assert_eq!(second.recv().await.unwrap().event, "user-typing");
        assert!(other.try_recv().is_err());
        assert_eq!(hub.subscriber_count("note-1"), 2);
        assert_eq!(hub.messages_sent(), 1);
    }

    #[tokio::test]
    async fn send_without_subscribers_succeeds() {
        let hub = InMemoryHub::new();
        assert!(hub
            .send("note-1", ChannelMessage::new("user-typing", json!({})))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn offline_hub_rejects_send_and_subscribe() {
        let hub = InMemoryHub::new();
        hub.set_online(false);

        let error = hub
            .send("note-1", ChannelMessage::new("user-typing", json!({})))
            .await
            .unwrap_err();
        assert!(error.is_transient());
        assert!(hub.subscribe("note-1").await.is_err());

        hub.set_online(true);
        assert!(hub.subscribe("note-1").await.is_ok());
    }
}
