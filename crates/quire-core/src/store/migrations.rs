//! Schema migrations for the SQLite store

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < CURRENT_VERSION {
        tracing::info!("Migrated schema from v{} to v{}", version, CURRENT_VERSION);
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: documents table
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(updated_at DESC);
        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;
    tracing::debug!("Applied migration v1");
    Ok(())
}

/// Migration to version 2: track the writer of the last update
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        ALTER TABLE documents ADD COLUMN updated_by TEXT;
        CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner);
        INSERT INTO schema_version (version) VALUES (2);
        COMMIT;",
    )?;
    tracing::debug!("Applied migration v2");
    Ok(())
}
