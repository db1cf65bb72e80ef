use std::path::Path;

use quire_core::{CollabConfig, UserProfile};
use serde::Serialize;

use crate::commands::common::resolve_identity;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EffectiveConfig {
    pub db_path: String,
    pub identity: Option<UserProfile>,
    pub collab: CollabConfig,
}

pub fn run_config(as_json: bool, user: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let identity = match resolve_identity(user) {
        Ok(profile) => Some(profile),
        Err(CliError::MissingIdentity) => None,
        Err(error) => return Err(error),
    };
    let config = EffectiveConfig {
        db_path: db_path.display().to_string(),
        identity,
        collab: CollabConfig::from_env()?,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        for line in format_config_lines(&config) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_config_lines(config: &EffectiveConfig) -> Vec<String> {
    let user = config.identity.as_ref().map_or_else(
        || "(not set)".to_string(),
        |profile| format!("{} ({})", profile.display_name(), profile.id),
    );
    let collab = &config.collab;

    vec![
        format!("db_path:          {}", config.db_path),
        format!("user:             {user}"),
        format!("debounce:         {}ms", collab.debounce_ms),
        format!("typing_expiry:    {}ms", collab.typing_expiry_ms),
        format!("presence_timeout: {}s", collab.presence_timeout_secs),
        format!("heartbeat:        {}s", collab.heartbeat_secs),
        format!("close_behavior:   {}", collab.close_behavior),
    ]
}
