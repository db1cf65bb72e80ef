//! Edit conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Field, UserId};

/// Identifier of an outstanding conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictId(Uuid);

impl ConflictId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A remote change arrived for a field that also has an unsaved local edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub field: Field,
    pub local_value: String,
    pub remote_value: String,
    pub remote_user: UserId,
    pub remote_user_name: String,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}

/// How the user chose to settle a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the local pending edit, discard the remote value
    Local,
    /// Discard the local pending edit, adopt the remote value
    Remote,
    /// Concatenate both values around a visible separator
    Merge,
}

impl Resolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "merge" => Ok(Self::Merge),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown resolution '{other}' (expected local, remote, or merge)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_case_insensitively() {
        assert_eq!("MERGE".parse::<Resolution>().unwrap(), Resolution::Merge);
        assert_eq!("remote".parse::<Resolution>().unwrap(), Resolution::Remote);
        assert!("theirs".parse::<Resolution>().is_err());
    }

    #[test]
    fn resolution_serializes_lowercase() {
        let json = serde_json::to_string(&Resolution::Local).unwrap();
        assert_eq!(json, "\"local\"");
    }
}
