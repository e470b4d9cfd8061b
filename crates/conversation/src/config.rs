//! Conversation settings
//!
//! Loaded from (in order of priority):
//! 1. `conversation.json` in the Parley config directory
//! 2. Environment variables
//! 3. Built-in defaults

use anyhow::{Context, Result};
use chrono::Duration;
use config::ConfigDir;
use log::debug;
use serde::{Deserialize, Serialize};

/// Settings filename in the Parley config directory
pub const SETTINGS_FILE: &str = "conversation.json";

const ENV_EXPIRY_HOURS: &str = "PARLEY_FRIEND_REQUEST_EXPIRY_HOURS";
const ENV_NOTE_TO_SELF: &str = "PARLEY_NOTE_TO_SELF";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// A pending friend request older than this reads as expired
    pub friend_request_expiry_hours: u32,
    /// Duration offered when disappearing messages are first enabled
    pub default_disappearing_duration_seconds: u32,
    pub note_to_self_enabled: bool,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            friend_request_expiry_hours: 72,
            default_disappearing_duration_seconds: 86_400,
            note_to_self_enabled: true,
        }
    }
}

impl ConversationSettings {
    /// Load settings from the default config directory
    pub fn load() -> Result<Self> {
        match ConfigDir::default_location() {
            Some(dir) => Self::load_from(&dir),
            None => Self::from_env(),
        }
    }

    /// Load settings from `dir`, falling back to the environment
    pub fn load_from(dir: &ConfigDir) -> Result<Self> {
        if dir.exists(SETTINGS_FILE) {
            debug!("Loading conversation settings from {}", dir.path(SETTINGS_FILE).display());
            return dir.load_json(SETTINGS_FILE);
        }
        Self::from_env()
    }

    /// Defaults, overridden by any environment variables that are set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(hours) = lookup(ENV_EXPIRY_HOURS) {
            settings.friend_request_expiry_hours = hours
                .trim()
                .parse()
                .with_context(|| format!("{ENV_EXPIRY_HOURS} must be a whole number of hours"))?;
        }

        if let Some(flag) = lookup(ENV_NOTE_TO_SELF) {
            settings.note_to_self_enabled = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => anyhow::bail!("{ENV_NOTE_TO_SELF} has unrecognized value {other:?}"),
            };
        }

        Ok(settings)
    }

    pub fn save_to(&self, dir: &ConfigDir) -> Result<()> {
        dir.save_json(SETTINGS_FILE, self)
    }

    /// Window after which a pending friend request expires
    pub fn friend_request_expiry(&self) -> Duration {
        Duration::hours(i64::from(self.friend_request_expiry_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = ConversationSettings::default();
        assert_eq!(settings.friend_request_expiry(), Duration::hours(72));
        assert_eq!(settings.default_disappearing_duration_seconds, 86_400);
        assert!(settings.note_to_self_enabled);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_EXPIRY_HOURS, "12"), (ENV_NOTE_TO_SELF, "no")]
            .into_iter()
            .collect();
        let settings =
            ConversationSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.friend_request_expiry_hours, 12);
        assert!(!settings.note_to_self_enabled);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let result = ConversationSettings::from_lookup(|k| {
            (k == ENV_EXPIRY_HOURS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let tmp = tempdir().unwrap();
        let dir = ConfigDir::at(tmp.path());
        let settings = ConversationSettings {
            friend_request_expiry_hours: 1,
            ..Default::default()
        };

        settings.save_to(&dir).unwrap();
        assert_eq!(ConversationSettings::load_from(&dir).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = tempdir().unwrap();
        std::fs::write(
            tmp.path().join(SETTINGS_FILE),
            r#"{"note_to_self_enabled": false}"#,
        )
        .unwrap();

        let settings = ConversationSettings::load_from(&ConfigDir::at(tmp.path())).unwrap();
        assert!(!settings.note_to_self_enabled);
        assert_eq!(settings.friend_request_expiry_hours, 72);
    }
}
