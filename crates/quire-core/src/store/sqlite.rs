//! `SQLite` document store

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{broadcast, Mutex};

use super::{migrations, stamp_update, ChangeFeed, DocumentStore};
use crate::models::{ChangeEvent, Document, DocumentId, DocumentPatch, UserId};
use crate::{Error, Result};

const SELECT_COLUMNS: &str =
    "SELECT id, owner, title, content, tags, created_at, updated_at, updated_by FROM documents";

/// Store backed by a local `SQLite` file.
///
/// Change notifications reach subscribers in this process only.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Open the database at `path`, creating it and its parent directory if
    /// needed. Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        let store = Self::from_connection(conn, Some(path))?;
        tracing::info!("Opened document store");
        Ok(store)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        configure(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            feed: ChangeFeed::default(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Documents, most recently updated first
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Document>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], RawDocument::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawDocument::into_document).collect()
    }
}

/// Configure `SQLite` for local use
fn configure(conn: &Connection) -> Result<()> {
    // In-memory databases report "memory" instead of switching to WAL.
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "cache_size", 10000)?;
    Ok(())
}

fn select_by_id(conn: &Connection, id: DocumentId) -> Result<Option<Document>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?"),
        params![id.as_str()],
        RawDocument::from_row,
    )
    .optional()?
    .map(RawDocument::into_document)
    .transpose()
}

/// Row as stored, before id parsing and tag decoding
struct RawDocument {
    id: String,
    owner: String,
    title: String,
    content: String,
    tags: String,
    created_at: i64,
    updated_at: i64,
    updated_by: Option<String>,
}

impl RawDocument {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            tags: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            updated_by: row.get(7)?,
        })
    }

    fn into_document(self) -> Result<Document> {
        let id = self
            .id
            .parse::<DocumentId>()
            .map_err(|_| Error::Database(format!("invalid document id '{}'", self.id)))?;
        Ok(Document {
            id,
            owner: UserId::new(self.owner),
            title: self.title,
            content: self.content,
            tags: serde_json::from_str(&self.tags)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            updated_by: self.updated_by.map(UserId::new),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, document: &Document) -> Result<()> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO documents
                (id, owner, title, content, tags, created_at, updated_at, updated_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                document.id.as_str(),
                document.owner.as_str(),
                document.title,
                document.content,
                serde_json::to_string(&document.tags)?,
                document.created_at,
                document.updated_at,
                document.updated_by.as_ref().map(UserId::as_str),
            ],
        )?;
        if inserted == 0 {
            return Err(Error::AlreadyExists(document.id.to_string()));
        }
        Ok(())
    }

    async fn select(&self, id: DocumentId) -> Result<Option<Document>> {
        let conn = self.conn.lock().await;
        select_by_id(&conn, id)
    }

    async fn update(
        &self,
        id: DocumentId,
        patch: &DocumentPatch,
        writer: &UserId,
    ) -> Result<Document> {
        let updated = {
            let conn = self.conn.lock().await;
            let mut document =
                select_by_id(&conn, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
            stamp_update(&mut document, patch, writer);

            let rows = conn.execute(
                "UPDATE documents SET title = ?, content = ?, updated_at = ?, updated_by = ?
                 WHERE id = ?",
                params![
                    document.title,
                    document.content,
                    document.updated_at,
                    writer.as_str(),
                    id.as_str()
                ],
            )?;
            if rows == 0 {
                return Err(Error::NotFound(id.to_string()));
            }
            document
        };

        self.feed
            .publish(ChangeEvent::new(writer.clone(), updated.clone()));
        Ok(updated)
    }

    async fn subscribe(&self, id: DocumentId) -> Result<broadcast::Receiver<ChangeEvent>> {
        self.feed.subscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::models::Field;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn insert_and_select_round_trip_tags() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = Document::new(alice(), "Groceries", "milk").with_tags(["#Home", "errands"]);

        store.insert(&doc).await.unwrap();

        assert_eq!(store.select(doc.id).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = Document::new(alice(), "Title", "");
        store.insert(&doc).await.unwrap();

        assert!(matches!(
            store.insert(&doc).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn update_persists_and_notifies() {
        let store = SqliteStore::open_in_memory().unwrap();
        let doc = Document::new(alice(), "Title", "Hello");
        store.insert(&doc).await.unwrap();
        let mut rx = store.subscribe(doc.id).await.unwrap();

        let bob = UserId::new("bob");
        let patch = DocumentPatch::field(Field::Content, "Hello world");
        let updated = store.update(doc.id, &patch, &bob).await.unwrap();

        assert_eq!(updated.content, "Hello world");
        assert_eq!(updated.updated_by, Some(bob.clone()));
        assert!(updated.updated_at > doc.updated_at);
        assert_eq!(store.select(doc.id).await.unwrap(), Some(updated.clone()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.writer, bob);
        assert_eq!(event.document, updated);
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let patch = DocumentPatch::field(Field::Title, "Ghost");

        assert!(matches!(
            store.update(DocumentId::new(), &patch, &alice()).await,
            Err(Error::NotFound(_))
        ));
        assert!(store.list(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_orders_by_most_recent_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = Document::new(alice(), "First", "");
        first.updated_at = 1_000;
        let mut second = Document::new(alice(), "Second", "");
        second.updated_at = 2_000;
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        assert_eq!(store.list(10, 0).await.unwrap()[0].title, "Second");

        store
            .update(first.id, &DocumentPatch::field(Field::Content, "bump"), &alice())
            .await
            .unwrap();

        let titles: Vec<_> = store
            .list(10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.title)
            .collect();
        assert_eq!(titles, vec!["First".to_string(), "Second".to_string()]);
        assert_eq!(store.list(1, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reopening_file_keeps_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("quire.db");
        let doc = Document::new(alice(), "Persistent", "body");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&doc).await.unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.select(doc.id).await.unwrap(), Some(doc));
    }
}
