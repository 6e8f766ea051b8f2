//! Session error types.

use thiserror::Error;

use crate::types::{DurationError, UserId};

/// Errors returned by the session registry and the chat-facing service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The user already has a session.
    #[error("{0} already has a pomodoro running")]
    AlreadyActive(UserId),

    /// The user has no session to stop.
    #[error("{0} has no pomodoro running")]
    NoActiveSession(UserId),

    /// The voice connection could not be established.
    #[error("could not join the voice channel: {0}")]
    Connection(String),

    /// Rejected before any session was constructed.
    #[error("invalid duration: {0}")]
    InvalidDuration(#[from] DurationError),

    /// A stop arrived while the voice connection was still being opened.
    #[error("pomodoro for {0} was cancelled before it started")]
    StartAborted(UserId),

    /// The configured sound is not in the catalog.
    #[error("unknown sound '{0}'")]
    UnknownSound(String),
}

impl SessionError {
    /// Returns true if the error stems from the user's request rather than
    /// from the environment.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive(_)
                | Self::NoActiveSession(_)
                | Self::InvalidDuration(_)
                | Self::UnknownSound(_)
        )
    }

    /// Returns a short hint shown after the error in chat.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::AlreadyActive(_) => "Stop the current pomodoro first.",
            Self::NoActiveSession(_) => "Nothing to stop.",
            Self::Connection(_) => "Check that the bot can join your voice channel.",
            Self::InvalidDuration(_) => "Durations are positive numbers of minutes, e.g. 25 or 0.5.",
            Self::StartAborted(_) => "Start a new pomodoro when you are ready.",
            Self::UnknownSound(_) => "List the available sounds to pick one.",
        }
    }
}
