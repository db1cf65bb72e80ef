//! In-process document store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{stamp_update, ChangeFeed, DocumentStore};
use crate::models::{ChangeEvent, Document, DocumentId, DocumentPatch, UserId};
use crate::{Error, Result};

/// One accepted `update` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub document_id: DocumentId,
    pub writer: UserId,
    pub patch: DocumentPatch,
}

/// Map-backed store shared by clients in one process.
///
/// Keeps a log of accepted writes and can be switched unavailable to
/// exercise failed saves.
#[derive(Debug)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentId, Document>>,
    writes: Mutex<Vec<WriteRecord>>,
    feed: ChangeFeed,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            feed: ChangeFeed::default(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate backend outage or recovery
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::info!(available, "Memory store availability changed");
    }

    /// Accepted writes, oldest first
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|writes| writes.len()).unwrap_or(0)
    }

    /// Documents ordered by most recent update
    pub fn list(&self) -> Result<Vec<Document>> {
        let mut documents: Vec<_> = self.documents()?.values().cloned().collect();
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(documents)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::TransportUnavailable(
                "document store is unavailable".to_string(),
            ))
        }
    }

    fn documents(&self) -> Result<std::sync::MutexGuard<'_, HashMap<DocumentId, Document>>> {
        self.documents
            .lock()
            .map_err(|_| Error::Database("document map lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, document: &Document) -> Result<()> {
        self.ensure_available()?;
        let mut documents = self.documents()?;
        if documents.contains_key(&document.id) {
            return Err(Error::AlreadyExists(document.id.to_string()));
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn select(&self, id: DocumentId) -> Result<Option<Document>> {
        self.ensure_available()?;
        Ok(self.documents()?.get(&id).cloned())
    }

    async fn update(
        &self,
        id: DocumentId,
        patch: &DocumentPatch,
        writer: &UserId,
    ) -> Result<Document> {
        self.ensure_available()?;
        let updated = {
            let mut documents = self.documents()?;
            let document = documents
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            stamp_update(document, patch, writer);
            document.clone()
        };

        if let Ok(mut writes) = self.writes.lock() {
            writes.push(WriteRecord {
                document_id: id,
                writer: writer.clone(),
                patch: patch.clone(),
            });
        }
        self.feed
            .publish(ChangeEvent::new(writer.clone(), updated.clone()));
        Ok(updated)
    }

    async fn subscribe(&self, id: DocumentId) -> Result<broadcast::Receiver<ChangeEvent>> {
        self.ensure_available()?;
        self.feed.subscribe(id)
    }
}
