//! Sound resource lookup.
//!
//! A catalog maps sound identifiers (file stems such as `lofi` or `bell`)
//! to playable files. The directory-backed catalog re-reads its directory
//! on every call, so files added or removed while the bot runs are seen by
//! the next lookup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::SoundError;

/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "aiff", "m4a"];

/// A resolved, playable sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundResource {
    /// Identifier as listed by the catalog.
    pub id: String,
    /// File to decode.
    pub path: PathBuf,
}

impl SoundResource {
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Resolves sound identifiers to playable resources.
pub trait SoundCatalog: Send + Sync {
    /// Lists every available sound identifier, sorted.
    fn list(&self) -> Result<Vec<String>, SoundError>;

    /// Resolves an identifier (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `SoundError::NotFound` if no such sound exists.
    fn resolve(&self, sound_id: &str) -> Result<SoundResource, SoundError>;
}

// ============================================================================
// DirectorySoundCatalog
// ============================================================================

/// Catalog backed by a directory of audio files.
#[derive(Debug, Clone)]
pub struct DirectorySoundCatalog {
    dir: PathBuf,
}

impl DirectorySoundCatalog {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the scanned directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&self) -> Result<Vec<SoundResource>, SoundError> {
        if !self.dir.exists() {
            warn!("Sound directory does not exist: {}", self.dir.display());
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SoundError::Io(format!("{}: {}", self.dir.display(), e)))?;

        let mut sounds = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_supported(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                sounds.push(SoundResource {
                    id: stem.to_string_lossy().into_owned(),
                    path,
                });
            }
        }

        sounds.sort_by(|a, b| a.id.cmp(&b.id));
        sounds.dedup_by(|a, b| a.id == b.id);
        Ok(sounds)
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

impl SoundCatalog for DirectorySoundCatalog {
    fn list(&self) -> Result<Vec<String>, SoundError> {
        Ok(self.scan()?.into_iter().map(|sound| sound.id).collect())
    }

    fn resolve(&self, sound_id: &str) -> Result<SoundResource, SoundError> {
        let found = self
            .scan()?
            .into_iter()
            .find(|sound| sound.id.eq_ignore_ascii_case(sound_id));
        match found {
            Some(sound) => {
                debug!("Resolved sound '{}' to {}", sound_id, sound.path.display());
                Ok(sound)
            }
            None => Err(SoundError::NotFound(sound_id.to_string())),
        }
    }
}

// ============================================================================
// MockSoundCatalog
// ============================================================================

/// In-memory catalog for tests.
#[derive(Debug, Default)]
pub struct MockSoundCatalog {
    sounds: Mutex<BTreeMap<String, PathBuf>>,
}

impl MockSoundCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog containing `ids`, each with a fake path.
    #[must_use]
    pub fn with_sounds(ids: &[&str]) -> Self {
        let catalog = Self::new();
        for id in ids {
            catalog.add(id);
        }
        catalog
    }

    pub fn add(&self, id: &str) {
        self.sounds
            .lock()
            .insert(id.to_string(), PathBuf::from(format!("/sounds/{id}.wav")));
    }

    pub fn remove(&self, id: &str) {
        self.sounds.lock().remove(id);
    }
}

impl SoundCatalog for MockSoundCatalog {
    fn list(&self) -> Result<Vec<String>, SoundError> {
        Ok(self.sounds.lock().keys().cloned().collect())
    }

    fn resolve(&self, sound_id: &str) -> Result<SoundResource, SoundError> {
        self.sounds
            .lock()
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(sound_id))
            .map(|(id, path)| SoundResource::new(id.clone(), path.clone()))
            .ok_or_else(|| SoundError::NotFound(sound_id.to_string()))
    }
}
