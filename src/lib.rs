//! Pomodoro Bot Library
//!
//! Runs per-user focus/break cycles for chat users, with ambient sound
//! looped during focus and a notification sound at every phase boundary.
//! It includes:
//! - Timer scheduler with cancellable, single-fire callbacks
//! - Session state machine and the per-user session registry
//! - Sound catalog, voice transport and playback control
//! - Notification sink and message texts
//! - Chat command grammar and dispatch
//! - Configuration and the console harness used by the binary

pub mod bot;
pub mod cli;
pub mod config;
pub mod notify;
pub mod scheduler;
pub mod session;
pub mod sound;
pub mod types;

// Re-export commonly used types for convenience
pub use bot::{ChatMessage, CommandHandler, PomodoroService};
pub use config::BotConfig;
pub use scheduler::{TimerHandle, TimerScheduler};
pub use session::{
    AudioSettings, AudioSettingsStore, Session, SessionContext, SessionError, SessionParams,
    SessionRegistry, DRAIN_GRACE,
};
pub use types::{ChannelRef, NotifyTarget, SessionPhase, SessionSnapshot, UserId};

// Re-export sound types
pub use sound::{
    DirectorySoundCatalog, LocalAudioTransport, MockSoundCatalog, MockVoiceTransport,
    PlaybackController, PlaybackError, SoundCatalog, SoundError, VoiceConnection, VoiceTransport,
};

// Re-export notification types
pub use notify::{ConsoleSink, MockNotificationSink, NotificationSink};
