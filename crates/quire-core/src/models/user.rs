//! User identity model

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque user identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity metadata stamped on every broadcast so peers can render
/// presence without a secondary lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            full_name: None,
            avatar_url: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    /// Full name, else email, else the raw id
    #[must_use]
    pub fn display_name(&self) -> &str {
        [self.full_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Uppercased first character of the display name, for avatar fallbacks
    #[must_use]
    pub fn initial(&self) -> String {
        self.display_name()
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

const PARTICIPANT_COLORS: [&str; 14] = [
    "#3b82f6", // blue
    "#ef4444", // red
    "#22c55e", // green
    "#f59e0b", // amber
    "#8b5cf6", // violet
    "#ec4899", // pink
    "#06b6d4", // cyan
    "#f97316", // orange
    "#14b8a6", // teal
    "#a855f7", // purple
    "#84cc16", // lime
    "#6366f1", // indigo
    "#d946ef", // fuchsia
    "#0ea5e9", // sky
];

/// Stable cursor colour for a user; the same id always maps to the same colour
#[must_use]
pub fn participant_color(user_id: &UserId) -> &'static str {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    let index = usize::try_from(hasher.finish() % PARTICIPANT_COLORS.len() as u64).unwrap_or(0);
    PARTICIPANT_COLORS[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_name_then_email() {
        let profile = UserProfile::new("u1")
            .with_email("ada@example.com")
            .with_full_name("Ada");
        assert_eq!(profile.display_name(), "Ada");

        let profile = UserProfile::new("u1").with_email("ada@example.com");
        assert_eq!(profile.display_name(), "ada@example.com");

        let profile = UserProfile::new("u1").with_full_name("  ");
        assert_eq!(profile.display_name(), "u1");
    }

    #[test]
    fn initial_is_uppercased() {
        let profile = UserProfile::new("u1").with_email("bob@example.com");
        assert_eq!(profile.initial(), "B");
    }

    #[test]
    fn participant_color_is_stable() {
        let id = UserId::new("user-42");
        assert_eq!(participant_color(&id), participant_color(&id));
        assert!(participant_color(&id).starts_with('#'));
        assert_eq!(participant_color(&id).len(), 7);
    }

    #[test]
    fn user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
