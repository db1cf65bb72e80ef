//! Document model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UserId;

/// A unique identifier for a document, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new unique document ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    /// Realtime topic carrying ephemeral signals for this document
    #[must_use]
    pub fn topic(&self) -> String {
        format!("note-{}", self.0)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Document fields that can be edited concurrently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Content,
}

impl Field {
    /// All contested fields, in reconciliation order
    pub const ALL: [Self; 2] = [Self::Title, Self::Content];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "content" => Ok(Self::Content),
            other => Err(crate::Error::InvalidInput(format!("unknown field '{other}'"))),
        }
    }
}

/// A shared note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,
    /// Creator and exclusive owner
    pub owner: UserId,
    /// Title line
    pub title: String,
    /// Body content (rich text/HTML or markdown)
    pub content: String,
    /// Normalised tag set
    pub tags: Vec<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Writer of the most recent persisted update
    pub updated_by: Option<UserId>,
}

impl Document {
    /// Create a new document owned by `owner`
    #[must_use]
    pub fn new(owner: UserId, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: DocumentId::new(),
            owner,
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    /// Replace the tag set, normalising it
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Read a contested field
    #[must_use]
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Content => &self.content,
        }
    }

    /// Overwrite a contested field
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        match field {
            Field::Title => self.title = value.into(),
            Field::Content => self.content = value.into(),
        }
    }

    /// Apply a patch without touching timestamps
    pub fn apply_patch(&mut self, patch: &DocumentPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
    }

    /// Get title, or the first content line when the title is blank,
    /// truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            self.content.lines().next().unwrap_or("")
        } else {
            self.title.as_str()
        };
        source.trim().chars().take(max_len).collect()
    }
}

/// Partial update of the contested fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DocumentPatch {
    /// Patch that sets a single field
    #[must_use]
    pub fn field(field: Field, value: impl Into<String>) -> Self {
        let mut patch = Self::default();
        patch.set(field, value);
        patch
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        match field {
            Field::Title => self.title = Some(value.into()),
            Field::Content => self.content = Some(value.into()),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Normalise tags: trimmed, lowercase, deduplicated, sorted, empties dropped
#[must_use]
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().trim_start_matches('#').to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::new("user-a")
    }

    #[test]
    fn test_document_id_unique() {
        let id1 = DocumentId::new();
        let id2 = DocumentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_document_id_parse() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_document_topic() {
        let id = DocumentId::new();
        assert_eq!(id.topic(), format!("note-{id}"));
    }

    #[test]
    fn test_document_new() {
        let doc = Document::new(owner(), "Groceries", "Milk");
        assert_eq!(doc.title, "Groceries");
        assert_eq!(doc.content, "Milk");
        assert!(doc.created_at > 0);
        assert_eq!(doc.created_at, doc.updated_at);
        assert!(doc.updated_by.is_none());
    }

    #[test]
    fn test_field_access() {
        let mut doc = Document::new(owner(), "T", "C");
        assert_eq!(doc.field(Field::Title), "T");
        doc.set_field(Field::Content, "new body");
        assert_eq!(doc.field(Field::Content), "new body");
    }

    #[test]
    fn test_field_parse() {
        assert_eq!("Content".parse::<Field>().unwrap(), Field::Content);
        assert_eq!(" title ".parse::<Field>().unwrap(), Field::Title);
        assert!("tags".parse::<Field>().is_err());
    }

    #[test]
    fn test_apply_patch_only_touches_set_fields() {
        let mut doc = Document::new(owner(), "T", "C");
        doc.apply_patch(&DocumentPatch::field(Field::Content, "C2"));
        assert_eq!(doc.title, "T");
        assert_eq!(doc.content, "C2");
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(["Work", " #work", "ideas", "", "  "]);
        assert_eq!(tags, vec!["ideas", "work"]);
    }

    #[test]
    fn test_title_preview_falls_back_to_content() {
        let doc = Document::new(owner(), "  ", "First line\nSecond line");
        assert_eq!(doc.title_preview(50), "First line");
        assert_eq!(doc.title_preview(5), "First");
    }
}
