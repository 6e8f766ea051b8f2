//! Turns chat messages into service calls and replies.

use std::sync::Arc;

use tracing::debug;

use super::commands::{self, ChatAction, Parsed};
use super::service::{PomodoroService, AMBIENT_OFF};
use crate::notify::content::format_minutes;
use crate::session::SessionError;
use crate::types::{
    format_clock, parse_minutes, ChannelRef, NotifyTarget, SessionPhase, SessionSnapshot, UserId,
};

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub author: UserId,
    /// Messages from bots (including this one) are never handled.
    pub author_is_bot: bool,
    /// Voice channel the author is in; the session's audio goes there.
    pub voice_channel: ChannelRef,
    /// Where the reply and session notifications go.
    pub reply_to: NotifyTarget,
    pub text: String,
}

/// Dispatches chat commands to a [`PomodoroService`].
#[derive(Debug, Clone)]
pub struct CommandHandler {
    service: Arc<PomodoroService>,
    prefix: String,
}

impl CommandHandler {
    #[must_use]
    pub fn new(service: Arc<PomodoroService>, prefix: impl Into<String>) -> Self {
        Self {
            service,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &Arc<PomodoroService> {
        &self.service
    }

    /// Handles one message. Returns the reply to post, if any.
    ///
    /// A successful `start` has no reply: the session announces itself
    /// through the notification sink.
    pub async fn handle(&self, message: &ChatMessage) -> Option<String> {
        if message.author_is_bot {
            return None;
        }
        let action = match commands::parse(&self.prefix, &message.text) {
            Parsed::Ignored => return None,
            Parsed::Invalid(usage) => return Some(usage.trim_end().to_string()),
            Parsed::Command(action) => action,
        };
        debug!(user = %message.author, ?action, "Handling chat command");

        let user = &message.author;
        match action {
            ChatAction::Start {
                work,
                break_minutes,
            } => self.handle_start(message, work, break_minutes).await,
            ChatAction::Stop => Some(self.handle_stop(user)),
            ChatAction::Status => Some(self.handle_status(user)),
            ChatAction::Ambient { sound } => Some(self.handle_ambient(user, &sound)),
            ChatAction::Notify { sound } => Some(self.handle_notify(user, &sound)),
            ChatAction::Sounds => Some(self.handle_sounds()),
            ChatAction::Help => Some(commands::help_text(&self.prefix).trim_end().to_string()),
        }
    }

    async fn handle_start(
        &self,
        message: &ChatMessage,
        work: Option<String>,
        break_minutes: Option<String>,
    ) -> Option<String> {
        let user = &message.author;
        let parsed = work
            .as_deref()
            .map(parse_minutes)
            .transpose()
            .and_then(|work| {
                break_minutes
                    .as_deref()
                    .map(parse_minutes)
                    .transpose()
                    .map(|brk| (work, brk))
            });
        let (work, brk) = match parsed {
            Ok(durations) => durations,
            Err(e) => return Some(error_reply(user, &SessionError::from(e))),
        };

        match self
            .service
            .start(
                user,
                work,
                brk,
                message.voice_channel.clone(),
                message.reply_to.clone(),
            )
            .await
        {
            Ok(_) => None,
            Err(e) => Some(error_reply(user, &e)),
        }
    }

    fn handle_stop(&self, user: &UserId) -> String {
        match self.service.stop(user) {
            Ok(()) => format!("🛑 {} Pomodoro stopped.", user.mention()),
            Err(SessionError::NoActiveSession(_)) => format!("{} Nothing to stop.", user.mention()),
            Err(e) => error_reply(user, &e),
        }
    }

    fn handle_status(&self, user: &UserId) -> String {
        match self.service.status(user) {
            Some(snapshot) => status_reply(&snapshot),
            None => {
                let settings = self.service.settings(user);
                format!(
                    "{} No pomodoro running. Ambient: {}, notify: {}.",
                    user.mention(),
                    settings.ambient_sound.as_deref().unwrap_or(AMBIENT_OFF),
                    settings.notify_sound
                )
            }
        }
    }

    fn handle_ambient(&self, user: &UserId, sound: &str) -> String {
        let sound = if sound.eq_ignore_ascii_case(AMBIENT_OFF) {
            None
        } else {
            Some(sound)
        };
        match self.service.configure_ambient(user, sound) {
            Ok(Some(sound)) => format!("{} Ambient sound set to '{}'.", user.mention(), sound),
            Ok(None) => format!("{} Ambient sound off.", user.mention()),
            Err(e) => error_reply(user, &e),
        }
    }

    fn handle_notify(&self, user: &UserId, sound: &str) -> String {
        match self.service.configure_notify(user, sound) {
            Ok(sound) => format!("{} Notification sound set to '{}'.", user.mention(), sound),
            Err(e) => error_reply(user, &e),
        }
    }

    fn handle_sounds(&self) -> String {
        match self.service.list_available_sounds() {
            Ok(sounds) if sounds.is_empty() => "No sounds available.".to_string(),
            Ok(sounds) => format!("Available sounds: {}", sounds.join(", ")),
            Err(e) => format!("⚠️ Could not list sounds: {e}"),
        }
    }
}

fn error_reply(user: &UserId, error: &SessionError) -> String {
    format!("⚠️ {} {}. {}", user.mention(), error, error.suggestion())
}

fn status_reply(snapshot: &SessionSnapshot) -> String {
    let phase = match snapshot.phase {
        SessionPhase::Focus => "Focusing",
        SessionPhase::Break => "On a break",
        SessionPhase::Draining => "Wrapping up",
    };
    format!(
        "{} {} until {} ({} min focus / {} min break, started {}). Ambient: {}, notify: {}.",
        snapshot.user_id.mention(),
        phase,
        format_clock(&snapshot.phase_ends_at),
        format_minutes(snapshot.work_minutes),
        format_minutes(snapshot.break_minutes),
        format_clock(&snapshot.started_at),
        snapshot.ambient_sound.as_deref().unwrap_or(AMBIENT_OFF),
        snapshot.notify_sound
    )
}

// ============================================================================
// Tests
// ============================================================================
