//! Sound system error types.
//!
//! `SoundError` is what catalogs and transports report; `PlaybackError` is
//! what the per-session [`PlaybackController`](super::PlaybackController)
//! reports to the session state machine.

use thiserror::Error;

/// Errors raised by sound catalogs and voice transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundError {
    /// No sound with this identifier exists.
    #[error("sound not found: {0}")]
    NotFound(String),

    /// The sound directory could not be read.
    #[error("failed to read sounds: {0}")]
    Io(String),

    /// No audio output is available for this connection.
    #[error("audio device not available: {0}")]
    DeviceNotAvailable(String),

    /// Failed to decode the audio file.
    #[error("failed to decode sound file: {0}")]
    DecodeError(String),

    /// Failed to create or drive the output stream.
    #[error("audio stream error: {0}")]
    StreamError(String),

    /// The connection was already closed.
    #[error("voice connection is closed")]
    ConnectionClosed,
}

impl SoundError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotAvailable(_) | Self::StreamError(_) | Self::ConnectionClosed
        )
    }
}

/// Errors reported by a session's playback controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The voice connection could not be established.
    #[error("could not join the voice channel: {0}")]
    Connection(String),

    /// The requested sound does not resolve to a playable file.
    ///
    /// Non-fatal: the caller continues in silence for this step.
    #[error("sound '{0}' is missing, continuing without it")]
    MissingResource(String),

    /// The transport failed while starting playback.
    #[error("playback failed: {0}")]
    Transport(#[from] SoundError),
}

impl PlaybackError {
    /// Returns true for errors that must not end the session.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::MissingResource(_) | Self::Transport(_))
    }

    /// Returns true if this is a missing-sound warning.
    #[must_use]
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::MissingResource(_))
    }
}
