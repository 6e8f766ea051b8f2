//! Bot configuration.
//!
//! Settings are read from an optional TOML file; every field has a serde
//! default so a partial (or missing) file yields a usable configuration.
//! Command-line flags override the file afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{validate_minutes, DurationError};

/// File name looked up in the user config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

fn default_command_prefix() -> String {
    "!pomodoro".to_string()
}

fn default_work_minutes() -> f64 {
    25.0
}

fn default_break_minutes() -> f64 {
    5.0
}

fn default_notify_sound() -> String {
    "bell".to_string()
}

fn default_sounds_dir() -> PathBuf {
    PathBuf::from("sounds")
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Runtime configuration for the bot.
///
/// # Example
///
/// ```
/// use pomodoro_bot::config::BotConfig;
///
/// let config = BotConfig::default();
/// assert_eq!(config.command_prefix, "!pomodoro");
/// assert_eq!(config.default_work_minutes, 25.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Prefix a chat message must start with to be treated as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Focus length used when the user gives none.
    #[serde(default = "default_work_minutes")]
    pub default_work_minutes: f64,

    /// Break length used when the user gives none.
    #[serde(default = "default_break_minutes")]
    pub default_break_minutes: f64,

    /// Notification sound for users who never picked one.
    #[serde(default = "default_notify_sound")]
    pub default_notify_sound: String,

    /// Directory scanned for sound files.
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,

    /// Upper bound on establishing a voice connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            default_work_minutes: default_work_minutes(),
            default_break_minutes: default_break_minutes(),
            default_notify_sound: default_notify_sound(),
            sounds_dir: default_sounds_dir(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("default_work_minutes: {0}")]
    WorkMinutes(DurationError),

    #[error("default_break_minutes: {0}")]
    BreakMinutes(DurationError),

    #[error("connect_timeout_secs must be at least 1")]
    ConnectTimeout,

    #[error("command_prefix must not be empty")]
    EmptyPrefix,

    #[error("command_prefix must be a single word, got '{0}'")]
    PrefixNotOneWord(String),

    #[error("default_notify_sound must not be empty")]
    EmptyNotifySound,
}

impl BotConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Loads `path` if given, else the per-user config file if it exists,
    /// else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        // Chat text is split on whitespace before the prefix is compared.
        if self.command_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::PrefixNotOneWord(self.command_prefix.clone()));
        }
        validate_minutes(self.default_work_minutes).map_err(ConfigError::WorkMinutes)?;
        validate_minutes(self.default_break_minutes).map_err(ConfigError::BreakMinutes)?;
        if self.default_notify_sound.trim().is_empty() {
            return Err(ConfigError::EmptyNotifySound);
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ConnectTimeout);
        }
        Ok(())
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// `<config dir>/pomodoro-bot/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pomodoro-bot").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.default_break_minutes, 5.0);
        assert_eq!(config.default_notify_sound, "bell");
        assert_eq!(config.sounds_dir, PathBuf::from("sounds"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = BotConfig::from_toml_str("default_work_minutes = 50\n").unwrap();
        assert_eq!(config.default_work_minutes, 50.0);
        assert_eq!(config.default_break_minutes, 5.0);
        assert_eq!(config.command_prefix, "!pomodoro");
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(BotConfig::from_toml_str("").unwrap(), BotConfig::default());
    }

    #[test]
    fn test_invalid_durations_rejected() {
        let config = BotConfig {
            default_work_minutes: 0.0,
            ..BotConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::WorkMinutes(_))));

        let config = BotConfig {
            default_break_minutes: -1.0,
            ..BotConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BreakMinutes(_))));

        assert!(BotConfig::from_toml_str("default_break_minutes = 0").is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = BotConfig {
            connect_timeout_secs: 0,
            ..BotConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ConnectTimeout));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let config = BotConfig {
            command_prefix: "  ".to_string(),
            ..BotConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyPrefix));
    }

    #[test]
    fn test_prefix_with_whitespace_rejected() {
        for prefix in ["!pomo doro", " !pomodoro", "!pomodoro\t"] {
            let config = BotConfig {
                command_prefix: prefix.to_string(),
                ..BotConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::PrefixNotOneWord(prefix.to_string()))
            );
        }
        assert!(BotConfig::from_toml_str("command_prefix = \"!pomo doro\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "command_prefix = \"!tomato\"\nsounds_dir = \"/srv/sounds\"\n")
            .unwrap();

        let config = BotConfig::load(&path).unwrap();
        assert_eq!(config.command_prefix, "!tomato");
        assert_eq!(config.sounds_dir, PathBuf::from("/srv/sounds"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = BotConfig::load(Path::new("/nonexistent/pomodoro-bot.toml"));
        assert!(result.is_err());
    }
}
