//! User-facing message text.
//!
//! One builder per session event. Minutes are printed without a trailing
//! `.0` so whole and fractional durations both read naturally.

use chrono::{DateTime, Local};

use crate::types::{format_clock, UserId};

/// Formats a minute count (`25`, `0.5`).
#[must_use]
pub fn format_minutes(minutes: f64) -> String {
    format!("{minutes}")
}

/// Sent immediately when a session starts.
#[must_use]
pub fn session_started(
    user: &UserId,
    work_minutes: f64,
    ends_at: &DateTime<Local>,
    ambient: Option<&str>,
) -> String {
    let mut text = format!(
        "🍅 {} Pomodoro started! Focus for the next {} minutes, until {}.",
        user.mention(),
        format_minutes(work_minutes),
        format_clock(ends_at)
    );
    if let Some(sound) = ambient {
        text.push_str(&format!(" Playing '{sound}' while you work."));
    }
    text
}

/// Sent at the focus → break boundary.
#[must_use]
pub fn focus_complete(
    user: &UserId,
    work_minutes: f64,
    break_minutes: f64,
    break_ends_at: &DateTime<Local>,
) -> String {
    format!(
        "🔔 {} {} minutes are up, good work!\nRest for {} minutes, until {}. ☕",
        user.mention(),
        format_minutes(work_minutes),
        format_minutes(break_minutes),
        format_clock(break_ends_at)
    )
}

/// Sent at the break → draining boundary.
#[must_use]
pub fn break_complete(user: &UserId, command_prefix: &str) -> String {
    format!(
        "⏰ {} Break is over! Resume when you are ready. (Type `{} start` to begin another round.)",
        user.mention(),
        command_prefix
    )
}

/// Sent when a configured sound cannot be played.
#[must_use]
pub fn missing_sound(user: &UserId, sound_id: &str) -> String {
    format!(
        "⚠️ {} Sound '{}' is not available, continuing without it.",
        user.mention(),
        sound_id
    )
}
