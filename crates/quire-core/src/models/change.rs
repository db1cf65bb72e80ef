//! Persisted-document change notification

use serde::{Deserialize, Serialize};

use super::{Document, DocumentId, UserId};

/// Emitted by the backing store after a document row is updated.
///
/// Carries the full new row and the identity of the writer so subscribers
/// can suppress echoes of their own writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub document_id: DocumentId,
    pub writer: UserId,
    pub document: Document,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(writer: UserId, document: Document) -> Self {
        Self {
            document_id: document.id,
            writer,
            document,
        }
    }

    /// Whether the local user produced this change
    #[must_use]
    pub fn is_echo_of(&self, local_user: &UserId) -> bool {
        &self.writer == local_user
    }
}
