//! Realtime pub-sub channel collaborator.
//!
//! A channel carries ephemeral, never-persisted frames to every current
//! subscriber of a topic, best effort and at least once. Nothing is delivered
//! to a subscriber after it disconnects.

mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::protocol::ChannelMessage;
use crate::Result;

pub use memory::InMemoryHub;

/// Per-topic broadcast transport
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Publish a frame to every subscriber of `topic`
    async fn send(&self, topic: &str, message: ChannelMessage) -> Result<()>;

    /// Start receiving frames published to `topic`
    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<ChannelMessage>>;
}
