//! Per-user sound preferences.
//!
//! Entries are created on the first configuration command and live until
//! the process exits; nothing is persisted.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A user's chosen sounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Looped during focus; `None` means silence.
    #[serde(rename = "ambientSound")]
    pub ambient_sound: Option<String>,
    /// Played at each phase boundary.
    #[serde(rename = "notifySound")]
    pub notify_sound: String,
}

impl AudioSettings {
    fn with_default_notify(default_notify: &str) -> Self {
        Self {
            ambient_sound: None,
            notify_sound: default_notify.to_string(),
        }
    }
}

/// Map from user to [`AudioSettings`].
#[derive(Debug)]
pub struct AudioSettingsStore {
    settings: Mutex<HashMap<UserId, AudioSettings>>,
    default_notify: String,
}

impl AudioSettingsStore {
    /// Creates an empty store; unconfigured users get `default_notify`.
    #[must_use]
    pub fn new(default_notify: impl Into<String>) -> Self {
        Self {
            settings: Mutex::new(HashMap::new()),
            default_notify: default_notify.into(),
        }
    }

    /// Sets (or clears, with `None`) the user's ambient sound.
    pub fn set_ambient(&self, user: &UserId, sound: Option<String>) {
        let mut settings = self.settings.lock();
        settings
            .entry(user.clone())
            .or_insert_with(|| AudioSettings::with_default_notify(&self.default_notify))
            .ambient_sound = sound;
    }

    /// Sets the user's notification sound.
    pub fn set_notify(&self, user: &UserId, sound: impl Into<String>) {
        let mut settings = self.settings.lock();
        settings
            .entry(user.clone())
            .or_insert_with(|| AudioSettings::with_default_notify(&self.default_notify))
            .notify_sound = sound.into();
    }

    /// Returns the user's settings, or the defaults if never configured.
    /// Never creates an entry.
    #[must_use]
    pub fn get(&self, user: &UserId) -> AudioSettings {
        self.settings
            .lock()
            .get(user)
            .cloned()
            .unwrap_or_else(|| AudioSettings::with_default_notify(&self.default_notify))
    }

    /// Returns true if the user has configured anything.
    #[must_use]
    pub fn is_configured(&self, user: &UserId) -> bool {
        self.settings.lock().contains_key(user)
    }

    /// Number of configured users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
