//! Conflict detection and resolution for contested document fields

use crate::models::{Conflict, ConflictId, Field, Resolution, UserProfile};
use crate::{Error, Result};

/// Separator placed between the local and remote value by a merge
pub const DEFAULT_MERGE_SEPARATOR: &str = "\n\n---\n\n";

/// Value a field takes after a conflict is resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConflict {
    pub field: Field,
    pub resolution: Resolution,
    /// `None` when the local pending edit stays as it is
    pub value: Option<String>,
}

/// Outstanding conflicts for one document, at most one per field
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    conflicts: Vec<Conflict>,
    merge_separator: String,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_SEPARATOR)
    }
}

impl ConflictDetector {
    pub fn new(merge_separator: impl Into<String>) -> Self {
        Self {
            conflicts: Vec::new(),
            merge_separator: merge_separator.into(),
        }
    }

    /// Record a conflict between an unsaved local value and a remote one.
    ///
    /// Returns `None` when the values agree. An empty string is a known value
    /// like any other. A new detection on a field replaces the conflict
    /// already outstanding for it.
    pub fn detect(
        &mut self,
        field: Field,
        local_value: &str,
        remote_value: &str,
        remote_editor: &UserProfile,
        detected_at: i64,
    ) -> Option<Conflict> {
        if local_value == remote_value {
            return None;
        }

        let conflict = Conflict {
            id: ConflictId::new(),
            field,
            local_value: local_value.to_string(),
            remote_value: remote_value.to_string(),
            remote_user: remote_editor.id.clone(),
            remote_user_name: remote_editor.display_name().to_string(),
            detected_at,
        };

        if let Some(existing) = self.conflicts.iter_mut().find(|c| c.field == field) {
            tracing::debug!(
                "Replacing outstanding {} conflict {} with {}",
                field,
                existing.id,
                conflict.id
            );
            *existing = conflict.clone();
        } else {
            self.conflicts.push(conflict.clone());
        }
        Some(conflict)
    }

    /// Settle a conflict and remove it
    pub fn resolve(&mut self, id: ConflictId, resolution: Resolution) -> Result<ResolvedConflict> {
        let conflict = self.take(id)?;
        let value = match resolution {
            Resolution::Local => None,
            Resolution::Remote => Some(conflict.remote_value),
            Resolution::Merge => Some(self.merge(&conflict.local_value, &conflict.remote_value)),
        };
        Ok(ResolvedConflict {
            field: conflict.field,
            resolution,
            value,
        })
    }

    /// Remove a conflict without touching either value
    pub fn dismiss(&mut self, id: ConflictId) -> Result<Conflict> {
        self.take(id)
    }

    pub fn list(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn get(&self, id: ConflictId) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.id == id)
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.conflicts.iter().any(|c| c.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn merge(&self, local: &str, remote: &str) -> String {
        format!("{local}{}{remote}", self.merge_separator)
    }

    fn take(&mut self, id: ConflictId) -> Result<Conflict> {
        let index = self
            .conflicts
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::ConflictNotFound(id.to_string()))?;
        Ok(self.conflicts.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::UserId;

    fn bob() -> UserProfile {
        UserProfile::new("bob").with_full_name("Bob")
    }

    #[test]
    fn detects_diverging_values_with_remote_identity() {
        let mut detector = ConflictDetector::default();

        let conflict = detector
            .detect(Field::Content, "Hello there", "Hello world", &bob(), 10)
            .unwrap();

        assert_eq!(conflict.local_value, "Hello there");
        assert_eq!(conflict.remote_value, "Hello world");
        assert_eq!(conflict.remote_user, UserId::new("bob"));
        assert_eq!(conflict.remote_user_name, "Bob");
        assert_eq!(detector.list().len(), 1);
    }

    #[test]
    fn equal_values_are_not_a_conflict() {
        let mut detector = ConflictDetector::default();
        assert!(detector
            .detect(Field::Content, "same", "same", &bob(), 10)
            .is_none());
        assert!(detector.is_empty());
    }

    #[test]
    fn cleared_value_still_conflicts() {
        let mut detector = ConflictDetector::default();

        let conflict = detector
            .detect(Field::Content, "", "Hello world", &bob(), 1)
            .unwrap();

        assert_eq!(conflict.local_value, "");
        assert_eq!(conflict.remote_value, "Hello world");
        assert!(detector.has_field(Field::Content));
    }

    #[test]
    fn same_field_detections_coalesce() {
        let mut detector = ConflictDetector::default();
        let first = detector
            .detect(Field::Content, "mine", "v1", &bob(), 1)
            .unwrap();
        let second = detector
            .detect(Field::Content, "mine", "v2", &bob(), 2)
            .unwrap();
        detector.detect(Field::Title, "a", "b", &bob(), 3).unwrap();

        assert_eq!(detector.list().len(), 2);
        assert!(detector.get(first.id).is_none());
        assert_eq!(detector.get(second.id).unwrap().remote_value, "v2");
        assert!(detector.has_field(Field::Title));
    }

    #[test]
    fn resolutions_produce_expected_values() {
        let mut detector = ConflictDetector::default();

        let conflict = detector
            .detect(Field::Content, "A", "B", &bob(), 1)
            .unwrap();
        let local = detector.resolve(conflict.id, Resolution::Local).unwrap();
        assert_eq!(local.value, None);

        let conflict = detector
            .detect(Field::Content, "A", "B", &bob(), 2)
            .unwrap();
        let remote = detector.resolve(conflict.id, Resolution::Remote).unwrap();
        assert_eq!(remote.value.as_deref(), Some("B"));
        assert!(detector.is_empty());
    }

    #[test]
    fn merge_keeps_both_values_around_separator() {
        let mut detector = ConflictDetector::default();
        let conflict = detector
            .detect(Field::Content, "Hello there", "Hello world", &bob(), 1)
            .unwrap();

        let merged = detector.resolve(conflict.id, Resolution::Merge).unwrap();

        assert_eq!(merged.field, Field::Content);
        assert_eq!(
            merged.value.as_deref(),
            Some("Hello there\n\n---\n\nHello world")
        );
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut detector = ConflictDetector::default();
        let missing = ConflictId::new();

        assert!(matches!(
            detector.resolve(missing, Resolution::Local),
            Err(Error::ConflictNotFound(_))
        ));
        assert!(matches!(
            detector.dismiss(missing),
            Err(Error::ConflictNotFound(_))
        ));
    }

    #[test]
    fn dismiss_removes_without_resolving() {
        let mut detector = ConflictDetector::default();
        let conflict = detector.detect(Field::Title, "a", "b", &bob(), 1).unwrap();

        let dismissed = detector.dismiss(conflict.id).unwrap();

        assert_eq!(dismissed.local_value, "a");
        assert!(!detector.has_field(Field::Title));
    }
}
