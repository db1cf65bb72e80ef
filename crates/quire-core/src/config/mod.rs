//! Runtime configuration for collaborative editing.
//!
//! `CollabConfig` holds the timing windows shared by every session and
//! `IdentityConfig` names the local user. Both read from the process
//! environment through a lookup function so tests never touch real env vars.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conflict::DEFAULT_MERGE_SEPARATOR;
use crate::models::UserProfile;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
const DEFAULT_TYPING_EXPIRY_MS: u64 = 2_000;
const DEFAULT_PRESENCE_TIMEOUT_SECS: u64 = 45;
const DEFAULT_HEARTBEAT_SECS: u64 = 15;
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// What happens to an unsaved edit when a session closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseBehavior {
    /// Write the pending edit immediately
    #[default]
    Flush,
    /// Drop the pending edit
    Discard,
}

impl CloseBehavior {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flush => "flush",
            Self::Discard => "discard",
        }
    }
}

impl fmt::Display for CloseBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseBehavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flush" => Ok(Self::Flush),
            "discard" => Ok(Self::Discard),
            other => Err(Error::Config(format!(
                "close behavior must be flush or discard, got '{other}'"
            ))),
        }
    }
}

/// Timing and policy knobs for collaborative sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CollabConfig {
    /// Quiet period before a local edit is written
    pub debounce_ms: u64,
    /// How long a typing signal keeps a participant marked as typing
    pub typing_expiry_ms: u64,
    /// Participants not heard from for this long are dropped
    pub presence_timeout_secs: u64,
    /// Interval between liveness heartbeats
    pub heartbeat_secs: u64,
    /// Buffered session events per subscriber
    pub broadcast_capacity: usize,
    pub close_behavior: CloseBehavior,
    pub merge_separator: String,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            typing_expiry_ms: DEFAULT_TYPING_EXPIRY_MS,
            presence_timeout_secs: DEFAULT_PRESENCE_TIMEOUT_SECS,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            close_behavior: CloseBehavior::default(),
            merge_separator: DEFAULT_MERGE_SEPARATOR.to_string(),
        }
    }
}

impl CollabConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Build from a variable lookup, falling back to defaults for unset
    /// variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            debounce_ms: parse_or(&lookup, "QUIRE_DEBOUNCE_MS", defaults.debounce_ms)?,
            typing_expiry_ms: parse_or(
                &lookup,
                "QUIRE_TYPING_EXPIRY_MS",
                defaults.typing_expiry_ms,
            )?,
            presence_timeout_secs: parse_or(
                &lookup,
                "QUIRE_PRESENCE_TIMEOUT_SECS",
                defaults.presence_timeout_secs,
            )?,
            heartbeat_secs: parse_or(&lookup, "QUIRE_HEARTBEAT_SECS", defaults.heartbeat_secs)?,
            broadcast_capacity: defaults.broadcast_capacity,
            close_behavior: match optional_trimmed(&lookup, "QUIRE_CLOSE_BEHAVIOR") {
                Some(value) => value.parse()?,
                None => defaults.close_behavior,
            },
            merge_separator: defaults.merge_separator,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(Error::Config("debounce_ms must be > 0".to_string()));
        }
        if self.typing_expiry_ms == 0 {
            return Err(Error::Config("typing_expiry_ms must be > 0".to_string()));
        }
        if self.heartbeat_secs == 0 {
            return Err(Error::Config("heartbeat_secs must be > 0".to_string()));
        }
        if self.heartbeat_secs >= self.presence_timeout_secs {
            return Err(Error::Config(
                "heartbeat_secs must be shorter than presence_timeout_secs".to_string(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(Error::Config("broadcast_capacity must be > 0".to_string()));
        }
        Ok(())
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn typing_expiry(&self) -> Duration {
        Duration::from_millis(self.typing_expiry_ms)
    }

    pub const fn presence_timeout(&self) -> Duration {
        Duration::from_secs(self.presence_timeout_secs)
    }

    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// The local user as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let user_id = optional_trimmed(&lookup, "QUIRE_USER_ID").ok_or_else(|| {
            Error::Config("Missing required environment variable: QUIRE_USER_ID".to_string())
        })?;
        let avatar_url = optional_trimmed(&lookup, "QUIRE_AVATAR_URL");
        if let Some(url) = avatar_url.as_deref() {
            if !is_http_url(url) {
                return Err(Error::Config(
                    "QUIRE_AVATAR_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(Self {
            user_id,
            email: optional_trimmed(&lookup, "QUIRE_USER_EMAIL"),
            full_name: optional_trimmed(&lookup, "QUIRE_USER_NAME"),
            avatar_url,
        })
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id.clone().into(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

fn optional_trimmed(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match optional_trimmed(lookup, name) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be a non-negative integer"))),
        None => Ok(default),
    }
}
