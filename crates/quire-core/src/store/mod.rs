//! Backing-store collaborator.
//!
//! A store persists documents and notifies subscribers after every update
//! with the full new row and the writer's id. Creation only happens through
//! `insert`; `update` never creates a missing row.

mod memory;
mod migrations;
mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::{ChangeEvent, Document, DocumentId, DocumentPatch, UserId};
use crate::Result;

pub use memory::{MemoryStore, WriteRecord};
pub use sqlite::SqliteStore;

const DEFAULT_FEED_CAPACITY: usize = 256;

/// Persistence for shared documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document; fails with `AlreadyExists` if the id is taken
    async fn insert(&self, document: &Document) -> Result<()>;

    /// Fetch a document by id
    async fn select(&self, id: DocumentId) -> Result<Option<Document>>;

    /// Apply `patch` on behalf of `writer` and return the new row.
    /// Fails with `NotFound` if the document does not exist.
    async fn update(&self, id: DocumentId, patch: &DocumentPatch, writer: &UserId)
        -> Result<Document>;

    /// Receive a `ChangeEvent` after every update of `id`
    async fn subscribe(&self, id: DocumentId) -> Result<broadcast::Receiver<ChangeEvent>>;
}

/// Per-document fan-out of change notifications
#[derive(Debug)]
pub struct ChangeFeed {
    senders: Mutex<HashMap<DocumentId, broadcast::Sender<ChangeEvent>>>,
    capacity: usize,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, id: DocumentId) -> Result<broadcast::Receiver<ChangeEvent>> {
        let mut senders = self.lock()?;
        let capacity = self.capacity;
        Ok(senders
            .entry(id)
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe())
    }

    /// Deliver `event` to current subscribers, returning how many received it.
    /// A document whose subscribers have all gone is dropped from the feed.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let Ok(mut senders) = self.lock() else {
            return 0;
        };
        let id = event.document_id;
        let Some(sender) = senders.get(&id) else {
            return 0;
        };
        if sender.receiver_count() == 0 {
            senders.remove(&id);
            return 0;
        }
        sender.send(event).unwrap_or(0)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<DocumentId, broadcast::Sender<ChangeEvent>>>>
    {
        self.senders
            .lock()
            .map_err(|_| crate::Error::Database("change feed lock poisoned".to_string()))
    }
}

/// Stamp an update onto `document`. `updated_at` never moves backwards so
/// rows written within the same millisecond still order correctly.
pub(crate) fn stamp_update(document: &mut Document, patch: &DocumentPatch, writer: &UserId) {
    document.apply_patch(patch);
    let now = chrono::Utc::now().timestamp_millis();
    document.updated_at = now.max(document.updated_at + 1);
    document.updated_by = Some(writer.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[tokio::test]
    async fn feed_delivers_only_to_matching_document() {
        let feed = ChangeFeed::default();
        let doc = Document::new(UserId::new("alice"), "A", "");
        let other = Document::new(UserId::new("alice"), "B", "");
        let mut rx = feed.subscribe(doc.id).unwrap();
        let mut other_rx = feed.subscribe(other.id).unwrap();

        let event = ChangeEvent::new(UserId::new("bob"), doc.clone());
        assert_eq!(feed.publish(event), 1);

        assert_eq!(rx.recv().await.unwrap().document_id, doc.id);
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let feed = ChangeFeed::default();
        let doc = Document::new(UserId::new("alice"), "A", "");
        assert_eq!(feed.publish(ChangeEvent::new(UserId::new("bob"), doc)), 0);
    }

    #[test]
    fn document_is_forgotten_once_subscribers_leave() {
        let feed = ChangeFeed::default();
        let doc = Document::new(UserId::new("alice"), "A", "");
        let rx = feed.subscribe(doc.id).unwrap();
        assert!(feed.lock().unwrap().contains_key(&doc.id));

        drop(rx);
        assert_eq!(feed.publish(ChangeEvent::new(UserId::new("bob"), doc.clone())), 0);
        assert!(feed.lock().unwrap().is_empty());

        // A later subscriber gets a fresh channel.
        let mut rx = feed.subscribe(doc.id).unwrap();
        assert_eq!(feed.publish(ChangeEvent::new(UserId::new("bob"), doc.clone())), 1);
        assert_eq!(rx.try_recv().unwrap().document_id, doc.id);
    }

    #[test]
    fn stamp_update_advances_timestamp_and_writer() {
        let mut doc = Document::new(UserId::new("alice"), "A", "body");
        doc.updated_at = i64::MAX / 2;
        let before = doc.updated_at;

        let patch = DocumentPatch::field(Field::Content, "new");
        stamp_update(&mut doc, &patch, &UserId::new("bob"));

        assert_eq!(doc.content, "new");
        assert_eq!(doc.updated_at, before + 1);
        assert_eq!(doc.updated_by, Some(UserId::new("bob")));
    }
}
