use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quire_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note title cannot be empty")]
    EmptyTitle,
    #[error("Nothing to change")]
    NothingToEdit,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("No user identity. Pass --user or set QUIRE_USER_ID")]
    MissingIdentity,
    #[error("Changes were not saved: {0}")]
    SaveFailed(String),
    #[error("Scenario '{0}' failed")]
    ScenarioFailed(String),
}
