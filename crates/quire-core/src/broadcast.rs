//! Fire-and-forget sender for ephemeral document signals.

use std::sync::Arc;

use crate::channel::RealtimeChannel;
use crate::models::{DocumentId, UserProfile};
use crate::protocol::{Signal, SignalEnvelope};

/// Stamps signals with the local identity and publishes them on a
/// document's topic. There is no acknowledgment; a failed send only leaves a
/// peer's indicator stale, so errors are logged and swallowed.
#[derive(Clone)]
pub struct Broadcaster {
    channel: Arc<dyn RealtimeChannel>,
    identity: UserProfile,
}

impl Broadcaster {
    pub fn new(channel: Arc<dyn RealtimeChannel>, identity: UserProfile) -> Self {
        Self { channel, identity }
    }

    pub const fn identity(&self) -> &UserProfile {
        &self.identity
    }

    pub async fn broadcast_cursor(&self, document_id: DocumentId, offset: usize) -> bool {
        self.send(document_id, Signal::CursorMove { offset }).await
    }

    pub async fn broadcast_typing(&self, document_id: DocumentId) -> bool {
        self.send(document_id, Signal::UserTyping).await
    }

    pub async fn announce_join(&self, document_id: DocumentId) -> bool {
        self.send(document_id, Signal::Join).await
    }

    pub async fn announce_leave(&self, document_id: DocumentId) -> bool {
        self.send(document_id, Signal::Leave).await
    }

    pub async fn heartbeat(&self, document_id: DocumentId) -> bool {
        self.send(document_id, Signal::Heartbeat).await
    }

    /// Returns whether the channel accepted the frame
    async fn send(&self, document_id: DocumentId, signal: Signal) -> bool {
        let frame = SignalEnvelope::new(self.identity.clone(), signal).encode();
        match self.channel.send(&document_id.topic(), frame).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    "Dropped {} signal for {}: {}",
                    signal.event_name(),
                    document_id,
                    error
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryHub;
    use crate::protocol::SignalEnvelope;

    #[tokio::test]
    async fn stamps_sender_identity_on_topic() {
        let hub = Arc::new(InMemoryHub::new());
        let doc = DocumentId::new();
        let mut rx = hub.subscribe(&doc.topic()).await.unwrap();
        let me = UserProfile::new("alice").with_full_name("Alice");
        let broadcaster = Broadcaster::new(hub.clone(), me.clone());

        assert!(broadcaster.broadcast_cursor(doc, 7).await);

        let envelope = SignalEnvelope::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(envelope.sender, me);
        assert_eq!(envelope.signal, Signal::CursorMove { offset: 7 });
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let hub = Arc::new(InMemoryHub::new());
        hub.set_online(false);
        let broadcaster = Broadcaster::new(hub, UserProfile::new("alice"));

        assert!(!broadcaster.broadcast_typing(DocumentId::new()).await);
    }
}
