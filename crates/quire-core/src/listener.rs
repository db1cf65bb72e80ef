//! Reconciliation of persisted remote changes with local editor state

use std::collections::BTreeMap;

use crate::models::{ChangeEvent, Document, Field, UserId};

/// An unsaved local edit of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Value the store held when the edit started
    pub persisted: String,
    /// Value typed locally
    pub unsaved: String,
}

/// Unsaved local edits keyed by field
pub type PendingEdits = BTreeMap<Field, PendingEdit>;

/// What happened to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// No local edit; the remote value replaced local state
    Applied { field: Field, value: String },
    /// Local edit and remote value disagree
    Conflict {
        field: Field,
        local: String,
        remote: String,
    },
    /// Local edit already equals the remote value
    Converged { field: Field },
}

impl FieldOutcome {
    pub const fn field(&self) -> Field {
        match self {
            Self::Applied { field, .. } | Self::Conflict { field, .. } | Self::Converged { field } => {
                *field
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The local user wrote this change; nothing to do
    Echo,
    Remote {
        /// Local document with applied fields and remote metadata
        document: Document,
        outcomes: Vec<FieldOutcome>,
    },
}

/// Decides, per field, whether a remote change is applied or conflicts
#[derive(Debug, Clone)]
pub struct RemoteChangeListener {
    local_user: UserId,
}

impl RemoteChangeListener {
    pub const fn new(local_user: UserId) -> Self {
        Self { local_user }
    }

    /// Reconcile `event` against the local document and unsaved edits.
    ///
    /// A field with an unsaved edit whose remote value still equals the
    /// value the edit started from was not touched remotely and produces no
    /// outcome.
    pub fn reconcile(
        &self,
        event: &ChangeEvent,
        local: &Document,
        pending: &PendingEdits,
    ) -> Reconciliation {
        if event.is_echo_of(&self.local_user) {
            tracing::debug!("Ignoring echo of own write to {}", event.document_id);
            return Reconciliation::Echo;
        }

        let remote = &event.document;
        let mut document = local.clone();
        document.tags.clone_from(&remote.tags);
        document.updated_at = remote.updated_at;
        document.updated_by = Some(event.writer.clone());

        let mut outcomes = Vec::new();
        for field in Field::ALL {
            let remote_value = remote.field(field);
            match pending.get(&field) {
                Some(edit) if remote_value == edit.persisted => {}
                Some(edit) if remote_value == edit.unsaved => {
                    outcomes.push(FieldOutcome::Converged { field });
                }
                Some(edit) => outcomes.push(FieldOutcome::Conflict {
                    field,
                    local: edit.unsaved.clone(),
                    remote: remote_value.to_string(),
                }),
                None if remote_value != local.field(field) => {
                    document.set_field(field, remote_value);
                    outcomes.push(FieldOutcome::Applied {
                        field,
                        value: remote_value.to_string(),
                    });
                }
                None => {}
            }
        }

        Reconciliation::Remote { document, outcomes }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn bob() -> UserId {
        UserId::new("bob")
    }

    fn remote_change(local: &Document, title: &str, content: &str) -> ChangeEvent {
        let mut remote = local.clone();
        remote.title = title.to_string();
        remote.content = content.to_string();
        remote.tags = vec!["shared".to_string()];
        remote.updated_at = local.updated_at + 500;
        ChangeEvent::new(bob(), remote)
    }

    fn pending(field: Field, persisted: &str, unsaved: &str) -> PendingEdits {
        PendingEdits::from([(
            field,
            PendingEdit {
                persisted: persisted.to_string(),
                unsaved: unsaved.to_string(),
            },
        )])
    }

    #[test]
    fn own_writes_are_echoes() {
        let listener = RemoteChangeListener::new(alice());
        let local = Document::new(alice(), "Title", "Hello");
        let mut remote = local.clone();
        remote.content = "Hello world".to_string();
        let event = ChangeEvent::new(alice(), remote);

        let with_pending = pending(Field::Content, "Hello", "Hello there");
        assert_eq!(
            listener.reconcile(&event, &local, &with_pending),
            Reconciliation::Echo
        );
        assert_eq!(
            listener.reconcile(&event, &local, &PendingEdits::new()),
            Reconciliation::Echo
        );
    }

    #[test]
    fn applies_remote_value_without_local_edit() {
        let listener = RemoteChangeListener::new(alice());
        let local = Document::new(alice(), "Title", "Hello");
        let event = remote_change(&local, "Title", "Hello world");

        let Reconciliation::Remote { document, outcomes } =
            listener.reconcile(&event, &local, &PendingEdits::new())
        else {
            panic!("expected remote reconciliation");
        };

        assert_eq!(
            outcomes,
            vec![FieldOutcome::Applied {
                field: Field::Content,
                value: "Hello world".to_string()
            }]
        );
        assert_eq!(document.content, "Hello world");
        assert_eq!(document.tags, vec!["shared".to_string()]);
        assert_eq!(document.updated_by, Some(bob()));
    }

    #[test]
    fn diverging_local_edit_becomes_conflict() {
        let listener = RemoteChangeListener::new(alice());
        let local = Document::new(alice(), "Title", "Hello there");
        let event = remote_change(&local, "Title", "Hello world");
        let edits = pending(Field::Content, "Hello", "Hello there");

        let Reconciliation::Remote { document, outcomes } =
            listener.reconcile(&event, &local, &edits)
        else {
            panic!("expected remote reconciliation");
        };

        assert_eq!(
            outcomes,
            vec![FieldOutcome::Conflict {
                field: Field::Content,
                local: "Hello there".to_string(),
                remote: "Hello world".to_string(),
            }]
        );
        // Local edit is never overwritten by a conflicting remote value.
        assert_eq!(document.content, "Hello there");
    }

    #[test]
    fn matching_local_edit_converges() {
        let listener = RemoteChangeListener::new(alice());
        let local = Document::new(alice(), "Title", "Same");
        let event = remote_change(&local, "Title", "Same");
        let edits = pending(Field::Content, "Old", "Same");

        let Reconciliation::Remote { outcomes, .. } = listener.reconcile(&event, &local, &edits)
        else {
            panic!("expected remote reconciliation");
        };
        assert_eq!(
            outcomes,
            vec![FieldOutcome::Converged {
                field: Field::Content
            }]
        );
    }

    #[test]
    fn untouched_field_with_local_edit_is_left_alone() {
        let listener = RemoteChangeListener::new(alice());
        let local = Document::new(alice(), "Title", "Draft in progress");
        // Bob renamed the note; content in the row is still the old value.
        let event = remote_change(&local, "Renamed", "Draft");
        let edits = pending(Field::Content, "Draft", "Draft in progress");

        let Reconciliation::Remote { document, outcomes } =
            listener.reconcile(&event, &local, &edits)
        else {
            panic!("expected remote reconciliation");
        };

        assert_eq!(
            outcomes,
            vec![FieldOutcome::Applied {
                field: Field::Title,
                value: "Renamed".to_string()
            }]
        );
        assert_eq!(document.title, "Renamed");
        assert_eq!(document.content, "Draft in progress");
    }
}
