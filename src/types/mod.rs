//! Core data types shared by the session engine and the chat layer.
//!
//! This module defines:
//! - Opaque identifiers for users, voice channels and message targets
//! - The session phase enumeration
//! - Duration validation (minutes from chat input → internal `Duration`)
//! - The serializable session snapshot used for status display

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque chat-platform user identifier.
    UserId
);

string_id!(
    /// Reference to the voice channel a session streams audio into.
    ChannelRef
);

string_id!(
    /// Where user-facing messages for a session are delivered.
    NotifyTarget
);

impl UserId {
    /// Returns the platform mention markup for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

// ============================================================================
// SessionPhase
// ============================================================================

/// Lifecycle phase of a running session.
///
/// `Focus → Break → Draining`; there are no other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Work period; the ambient sound (if any) loops.
    Focus,
    /// Rest period; silence apart from the boundary notification.
    Break,
    /// Cycle finished; connection held open for the trailing sound.
    Draining,
}

impl SessionPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Focus => "focus",
            SessionPhase::Break => "break",
            SessionPhase::Draining => "draining",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Durations
// ============================================================================

/// Upper bound for a single phase (one day).
pub const MAX_PHASE_MINUTES: f64 = 24.0 * 60.0;

/// Rejected duration input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DurationError {
    /// Input is not a number.
    #[error("'{0}' is not a number of minutes")]
    NotANumber(String),

    /// Zero, negative, NaN or infinite.
    #[error("duration must be a positive number of minutes, got {0}")]
    NotPositive(f64),

    /// Longer than [`MAX_PHASE_MINUTES`].
    #[error("duration of {0} minutes exceeds the {max} minute limit", max = MAX_PHASE_MINUTES)]
    TooLong(f64),
}

/// Parses a whole or fractional minute count from user input.
///
/// # Errors
///
/// Returns a [`DurationError`] for non-numeric, non-positive or oversized input.
pub fn parse_minutes(input: &str) -> Result<f64, DurationError> {
    let minutes: f64 = input
        .trim()
        .parse()
        .map_err(|_| DurationError::NotANumber(input.trim().to_string()))?;
    validate_minutes(minutes)?;
    Ok(minutes)
}

/// Validates a minute count.
pub fn validate_minutes(minutes: f64) -> Result<(), DurationError> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(DurationError::NotPositive(minutes));
    }
    if minutes > MAX_PHASE_MINUTES {
        return Err(DurationError::TooLong(minutes));
    }
    Ok(())
}

/// Converts validated minutes into the internal time unit (milliseconds).
///
/// Sub-millisecond remainders are rounded to the nearest millisecond, with a
/// floor of one millisecond so a positive input never becomes zero.
pub fn minutes_to_duration(minutes: f64) -> Result<Duration, DurationError> {
    validate_minutes(minutes)?;
    let millis = (minutes * 60_000.0).round().max(1.0) as u64;
    Ok(Duration::from_millis(millis))
}

/// Adds a std duration to a wall-clock instant, saturating on overflow.
pub fn clock_after(start: DateTime<Local>, delay: Duration) -> DateTime<Local> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(start)
}

/// Formats a wall-clock instant the way it is shown in chat.
pub fn format_clock(at: &DateTime<Local>) -> String {
    at.format("%H:%M").to_string()
}

// ============================================================================
// SessionSnapshot
// ============================================================================

/// Read-only view of a live session, used for status display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Per-session id (log correlation)
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    /// Owner of the session
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Current phase
    pub phase: SessionPhase,
    /// When the session was started
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Local>,
    /// When the current phase is scheduled to end
    #[serde(rename = "phaseEndsAt")]
    pub phase_ends_at: DateTime<Local>,
    /// Focus length
    #[serde(rename = "workMinutes")]
    pub work_minutes: f64,
    /// Break length
    #[serde(rename = "breakMinutes")]
    pub break_minutes: f64,
    /// Looped during focus, if any
    #[serde(rename = "ambientSound", skip_serializing_if = "Option::is_none")]
    pub ambient_sound: Option<String>,
    /// Played at phase boundaries
    #[serde(rename = "notifySound")]
    pub notify_sound: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod id_tests {
        use super::*;

        #[test]
        fn test_user_id_display_and_mention() {
            let user = UserId::from("42");
            assert_eq!(user.to_string(), "42");
            assert_eq!(user.mention(), "<@42>");
        }

        #[test]
        fn test_ids_serialize_transparently() {
            let channel = ChannelRef::new("voice-1");
            assert_eq!(serde_json::to_string(&channel).unwrap(), "\"voice-1\"");
        }
    }

    mod phase_tests {
        use super::*;

        #[test]
        fn test_as_str() {
            assert_eq!(SessionPhase::Focus.as_str(), "focus");
            assert_eq!(SessionPhase::Break.as_str(), "break");
            assert_eq!(SessionPhase::Draining.as_str(), "draining");
        }

        #[test]
        fn test_serialize() {
            let json = serde_json::to_string(&SessionPhase::Draining).unwrap();
            assert_eq!(json, "\"draining\"");
        }
    }

    mod duration_tests {
        use super::*;

        #[test]
        fn test_parse_whole_and_fractional() {
            assert_eq!(parse_minutes("25").unwrap(), 25.0);
            assert_eq!(parse_minutes(" 0.5 ").unwrap(), 0.5);
        }

        #[test]
        fn test_parse_rejects_non_numeric() {
            assert_eq!(
                parse_minutes("soon"),
                Err(DurationError::NotANumber("soon".to_string()))
            );
        }

        #[test]
        fn test_parse_rejects_non_positive() {
            assert!(matches!(parse_minutes("0"), Err(DurationError::NotPositive(_))));
            assert!(matches!(parse_minutes("-3"), Err(DurationError::NotPositive(_))));
            assert!(matches!(parse_minutes("NaN"), Err(DurationError::NotPositive(_))));
            assert!(matches!(parse_minutes("inf"), Err(DurationError::NotPositive(_))));
        }

        #[test]
        fn test_parse_rejects_too_long() {
            assert!(matches!(parse_minutes("1441"), Err(DurationError::TooLong(_))));
        }

        #[test]
        fn test_minutes_to_duration() {
            assert_eq!(minutes_to_duration(1.0).unwrap(), Duration::from_secs(60));
            assert_eq!(minutes_to_duration(0.5).unwrap(), Duration::from_secs(30));
            assert_eq!(minutes_to_duration(1e-9).unwrap(), Duration::from_millis(1));
            assert!(minutes_to_duration(0.0).is_err());
        }

        #[test]
        fn test_clock_after() {
            let start = Local::now();
            let end = clock_after(start, Duration::from_secs(90));
            assert_eq!((end - start).num_seconds(), 90);
        }

        #[test]
        fn test_format_clock() {
            let at = Local::now();
            let formatted = format_clock(&at);
            assert_eq!(formatted.len(), 5);
            assert_eq!(&formatted[2..3], ":");
        }
    }
}
