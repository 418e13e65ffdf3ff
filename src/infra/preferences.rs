use crate::domain::DEFAULT_ORPHAN_AGE_DAYS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MIN_ORPHAN_AGE_DAYS: u32 = 7;
pub const MAX_ORPHAN_AGE_DAYS: u32 = 90;

#[derive(Debug, Error)]
pub enum ResolveStateDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_state_dir() -> Result<PathBuf, ResolveStateDirError> {
    if let Some(override_dir) = std::env::var_os("CCTASKS_STATE_DIR") {
        return Ok(PathBuf::from(override_dir));
    }
    let Some(home) = dirs::home_dir() else {
        return Err(ResolveStateDirError::HomeDirNotFound);
    };
    Ok(home.join(".cctasks"))
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub claude_directory: Option<PathBuf>,
    pub orphan_age_days: u32,
    pub auto_remove_completed_sessions: bool,
    pub notify_on_task_complete: bool,
    pub notify_on_session_complete: bool,
    pub notify_on_blocked: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            claude_directory: None,
            orphan_age_days: DEFAULT_ORPHAN_AGE_DAYS,
            auto_remove_completed_sessions: false,
            notify_on_task_complete: true,
            notify_on_session_complete: true,
            notify_on_blocked: false,
        }
    }
}

impl Preferences {
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SetPreferenceError> {
        let invalid = || SetPreferenceError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "claudeDirectory" => {
                let value = value.trim();
                self.claude_directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "orphanAgeDays" => {
                let days = value.trim().parse::<u32>().map_err(|_| invalid())?;
                self.orphan_age_days = clamp_orphan_age_days(days);
            }
            "autoRemoveCompletedSessions" => {
                self.auto_remove_completed_sessions = parse_bool(value).ok_or_else(invalid)?;
            }
            "notifyOnTaskComplete" => {
                self.notify_on_task_complete = parse_bool(value).ok_or_else(invalid)?;
            }
            "notifyOnSessionComplete" => {
                self.notify_on_session_complete = parse_bool(value).ok_or_else(invalid)?;
            }
            "notifyOnBlocked" => {
                self.notify_on_blocked = parse_bool(value).ok_or_else(invalid)?;
            }
            _ => return Err(SetPreferenceError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "claudeDirectory",
                self.claude_directory
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            ),
            ("orphanAgeDays", self.orphan_age_days.to_string()),
            (
                "autoRemoveCompletedSessions",
                self.auto_remove_completed_sessions.to_string(),
            ),
            (
                "notifyOnTaskComplete",
                self.notify_on_task_complete.to_string(),
            ),
            (
                "notifyOnSessionComplete",
                self.notify_on_session_complete.to_string(),
            ),
            ("notifyOnBlocked", self.notify_on_blocked.to_string()),
        ]
    }
}

pub fn clamp_orphan_age_days(days: u32) -> u32 {
    days.clamp(MIN_ORPHAN_AGE_DAYS, MAX_ORPHAN_AGE_DAYS)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum SetPreferenceError {
    #[error("unknown preference: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum LoadPreferencesError {
    #[error("failed to read preferences: {0}")]
    Read(#[from] io::Error),

    #[error("failed to parse preferences: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SavePreferencesError {
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write preferences: {0}")]
    Write(#[from] io::Error),
}

fn preferences_path(state_dir: &Path) -> PathBuf {
    state_dir.join("preferences.json")
}

pub fn load_preferences(state_dir: &Path) -> Result<Preferences, LoadPreferencesError> {
    let path = preferences_path(state_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Ok(Preferences::default());
        }
        Err(error) => return Err(error.into()),
    };

    let file: PreferencesFile = serde_json::from_str(&raw)?;
    let mut preferences = file.preferences;
    preferences.orphan_age_days = clamp_orphan_age_days(preferences.orphan_age_days);
    Ok(preferences)
}

pub fn save_preferences(
    state_dir: &Path,
    preferences: &Preferences,
) -> Result<(), SavePreferencesError> {
    fs::create_dir_all(state_dir)?;

    let path = preferences_path(state_dir);
    let tmp = path.with_extension("json.tmp");
    let file = PreferencesFile {
        version: 1,
        preferences: preferences.clone(),
    };
    let text = serde_json::to_string_pretty(&file)?;
    fs::write(&tmp, text)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct PreferencesFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(flatten)]
    preferences: Preferences,
}

fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempdir().expect("tempdir");
        let preferences = load_preferences(dir.path()).expect("load");
        assert_eq!(preferences, Preferences::default());
        assert_eq!(preferences.orphan_age_days, 30);
        assert!(!preferences.auto_remove_completed_sessions);
    }

    #[test]
    fn round_trips_through_state_dir() {
        let dir = tempdir().expect("tempdir");
        let state = dir.path().join("state");

        let mut preferences = Preferences::default();
        preferences.set("orphanAgeDays", "14").expect("days");
        preferences
            .set("autoRemoveCompletedSessions", "yes")
            .expect("auto");
        preferences.set("claudeDirectory", "/tmp/claude").expect("dir");
        save_preferences(&state, &preferences).expect("save");

        let loaded = load_preferences(&state).expect("load");
        assert_eq!(loaded, preferences);
        assert_eq!(loaded.claude_directory, Some(PathBuf::from("/tmp/claude")));

        let raw = fs::read_to_string(state.join("preferences.json")).expect("read");
        assert!(raw.contains("\"orphanAgeDays\": 14"));
    }

    #[test]
    fn orphan_age_is_clamped() {
        let mut preferences = Preferences::default();
        preferences.set("orphanAgeDays", "2").expect("low");
        assert_eq!(preferences.orphan_age_days, MIN_ORPHAN_AGE_DAYS);
        preferences.set("orphanAgeDays", "365").expect("high");
        assert_eq!(preferences.orphan_age_days, MAX_ORPHAN_AGE_DAYS);

        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("preferences.json"),
            r#"{"version":1,"orphanAgeDays":1000}"#,
        )
        .expect("write");
        let loaded = load_preferences(dir.path()).expect("load");
        assert_eq!(loaded.orphan_age_days, MAX_ORPHAN_AGE_DAYS);
        assert!(loaded.notify_on_task_complete);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut preferences = Preferences::default();
        assert!(matches!(
            preferences.set("theme", "dark"),
            Err(SetPreferenceError::UnknownKey(_))
        ));
        assert!(matches!(
            preferences.set("notifyOnBlocked", "maybe"),
            Err(SetPreferenceError::InvalidValue { .. })
        ));
        assert!(matches!(
            preferences.set("orphanAgeDays", "-3"),
            Err(SetPreferenceError::InvalidValue { .. })
        ));
    }
}
