//! Error types for quire-core

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Result type alias using quire-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quire-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Document already exists
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store or realtime channel cannot be reached
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Malformed broadcast payload
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No outstanding conflict with this id
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    /// The editing session was already closed
    #[error("Editing session is closed")]
    SessionClosed,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error comes from an unreachable collaborator and the
    /// operation can be retried later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_) | Self::Database(_))
    }
}
