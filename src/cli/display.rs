//! Display utilities for the pomodoro-bot binary.
//!
//! This module provides formatted output for:
//! - Error messages
//! - Sound listings
//! - Shutdown summary

use std::path::Path;

use serde::Serialize;

// ============================================================================
// Display
// ============================================================================

#[derive(Serialize)]
struct SoundList<'a> {
    dir: &'a Path,
    sounds: &'a [String],
}

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the sounds found in `dir`.
    pub fn show_sounds(dir: &Path, sounds: &[String], json: bool) {
        println!("{}", Self::format_sounds(dir, sounds, json));
    }

    /// Formats a sound listing, one identifier per line.
    #[must_use]
    pub fn format_sounds(dir: &Path, sounds: &[String], json: bool) -> String {
        if json {
            return serde_json::to_string(&SoundList { dir, sounds })
                .unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
        }
        if sounds.is_empty() {
            return format!("No sounds found in {}", dir.display());
        }
        let mut out = format!("Sounds in {}:", dir.display());
        for sound in sounds {
            out.push_str("\n  ");
            out.push_str(sound);
        }
        out
    }

    /// Shows how many sessions were stopped at shutdown.
    pub fn show_shutdown(stopped: usize) {
        if stopped > 0 {
            eprintln!("Stopped {} running pomodoro(s)", stopped);
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }
}

// ============================================================================
// Tests
// ============================================================================
